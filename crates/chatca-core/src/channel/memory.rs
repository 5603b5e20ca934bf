//! In-process messaging hub
//!
//! Every [`MemoryChannel`] connected to the same [`MemoryHub`] sees every
//! message sent through the hub, the way members of a shared conversation
//! would. Membership, channel lists and the key-value store are plain maps.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use super::{KvStore, MessagingChannel, Subscription};
use crate::error::ChannelError;
use crate::message::{InboundMessage, MessageContent, MessageId, MessageRef, Sender};
use crate::roles::{TeamMember, TeamMembership, TeamRole};

type Feed = mpsc::Sender<Result<InboundMessage, ChannelError>>;

#[derive(Default)]
struct HubState {
    next_id: MessageId,
    subscribers: Vec<Feed>,
    members: HashMap<String, Vec<TeamMember>>,
    channels: HashMap<String, Vec<String>>,
    joined: Vec<(String, String)>,
    kv: HashMap<(String, String, String), String>,
    history: Vec<InboundMessage>,
}

/// Shared in-memory conversation space
#[derive(Clone, Default)]
pub struct MemoryHub {
    state: Arc<Mutex<HubState>>,
}

impl MemoryHub {
    /// Create an empty hub
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Connect a user to the hub
    pub fn connect(&self, username: impl Into<String>, device_name: impl Into<String>) -> MemoryChannel {
        MemoryChannel {
            hub: self.clone(),
            sender: Sender {
                username: username.into(),
                device_name: device_name.into(),
            },
        }
    }

    /// Set (or replace) a user's role in a team
    pub fn set_role(&self, team: &str, username: &str, role: TeamRole) {
        let mut state = self.lock();
        let members = state.members.entry(team.to_string()).or_default();
        members.retain(|m| m.username != username);
        members.push(TeamMember::new(username, role));
    }

    /// Remove a user from a team
    pub fn remove_member(&self, team: &str, username: &str) {
        if let Some(members) = self.lock().members.get_mut(team) {
            members.retain(|m| m.username != username);
        }
    }

    /// Register a channel in a team
    pub fn add_channel(&self, team: &str, channel: &str) {
        self.lock()
            .channels
            .entry(team.to_string())
            .or_default()
            .push(channel.to_string());
    }

    /// Channels joined through [`MessagingChannel::join_channel`]
    pub fn joined_channels(&self) -> Vec<(String, String)> {
        self.lock().joined.clone()
    }

    /// Every message delivered through the hub, in order
    pub fn history(&self) -> Vec<InboundMessage> {
        self.lock().history.clone()
    }

    /// Text bodies sent by the given user, in order
    pub fn bodies_from(&self, username: &str) -> Vec<String> {
        self.lock()
            .history
            .iter()
            .filter(|m| m.sender.username == username)
            .filter_map(|m| m.text().map(str::to_string))
            .collect()
    }

    /// Read a raw key-value entry
    pub fn kv_entry(&self, team: &str, namespace: &str, key: &str) -> Option<String> {
        self.lock()
            .kv
            .get(&(team.to_string(), namespace.to_string(), key.to_string()))
            .cloned()
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.lock();
        state.subscribers.retain(|feed| !feed.is_closed());
        state.subscribers.len()
    }

    /// Fail every live subscription with a read error
    pub fn fail_subscriptions(&self, reason: &str) {
        let subscribers = std::mem::take(&mut self.lock().subscribers);
        for feed in subscribers {
            let _ = feed.try_send(Err(ChannelError::Read(reason.to_string())));
        }
    }

    fn deliver(
        &self,
        sender: &Sender,
        team: &str,
        channel: Option<&str>,
        content: MessageContent,
    ) -> MessageRef {
        let mut state = self.lock();
        state.next_id += 1;
        let channel = channel.unwrap_or_default().to_string();
        let message = InboundMessage {
            id: state.next_id,
            conversation_id: format!("{}#{}", team, channel),
            team: team.to_string(),
            channel,
            sender: sender.clone(),
            content,
        };
        debug!(id = message.id, team, sender = %sender.username, "delivering message");
        state
            .subscribers
            .retain(|feed| feed.try_send(Ok(message.clone())).is_ok());
        state.history.push(message.clone());
        MessageRef { id: message.id }
    }
}

/// A user's connection to a [`MemoryHub`]
#[derive(Clone)]
pub struct MemoryChannel {
    hub: MemoryHub,
    sender: Sender,
}

impl MemoryChannel {
    /// React to a message
    pub fn react(&self, team: &str, channel: Option<&str>, target: MessageId, emoji: &str) -> MessageRef {
        self.hub.deliver(
            &self.sender,
            team,
            channel,
            MessageContent::Reaction {
                emoji: emoji.to_string(),
                target,
            },
        )
    }

    /// The hub this channel is connected to
    pub fn hub(&self) -> &MemoryHub {
        &self.hub
    }
}

#[async_trait]
impl MessagingChannel for MemoryChannel {
    fn username(&self) -> &str {
        &self.sender.username
    }

    async fn send(
        &self,
        team: &str,
        channel: Option<&str>,
        body: &str,
    ) -> Result<MessageRef, ChannelError> {
        Ok(self.hub.deliver(
            &self.sender,
            team,
            channel,
            MessageContent::Text {
                body: body.to_string(),
            },
        ))
    }

    async fn subscribe(&self) -> Result<Subscription, ChannelError> {
        let (tx, subscription) = Subscription::channel();
        self.hub.lock().subscribers.push(tx);
        Ok(subscription)
    }

    async fn list_memberships(&self, username: &str) -> Result<Vec<TeamMembership>, ChannelError> {
        let state = self.hub.lock();
        let mut memberships: Vec<TeamMembership> = state
            .members
            .iter()
            .filter_map(|(team, members)| {
                members
                    .iter()
                    .find(|m| m.username == username)
                    .map(|m| TeamMembership::new(team.clone(), m.role))
            })
            .collect();
        memberships.sort_by(|a, b| a.team.cmp(&b.team));
        Ok(memberships)
    }

    async fn list_channels(&self, team: &str) -> Result<Vec<String>, ChannelError> {
        Ok(self.hub.lock().channels.get(team).cloned().unwrap_or_default())
    }

    async fn join_channel(&self, team: &str, channel: &str) -> Result<(), ChannelError> {
        self.hub
            .lock()
            .joined
            .push((team.to_string(), channel.to_string()));
        Ok(())
    }

    async fn list_teams(&self) -> Result<Vec<String>, ChannelError> {
        let state = self.hub.lock();
        let mut teams: Vec<String> = state
            .members
            .iter()
            .filter(|(_, members)| {
                members
                    .iter()
                    .any(|m| m.username == self.sender.username && m.role.can_read_team())
            })
            .map(|(team, _)| team.clone())
            .collect();
        teams.sort();
        Ok(teams)
    }
}

#[async_trait]
impl KvStore for MemoryChannel {
    async fn put(
        &self,
        team: &str,
        namespace: &str,
        key: &str,
        value: &str,
    ) -> Result<(), ChannelError> {
        self.hub.lock().kv.insert(
            (team.to_string(), namespace.to_string(), key.to_string()),
            value.to_string(),
        );
        Ok(())
    }

    async fn get(
        &self,
        team: &str,
        namespace: &str,
        key: &str,
    ) -> Result<Option<String>, ChannelError> {
        Ok(self.hub.kv_entry(team, namespace, key))
    }

    async fn delete(&self, team: &str, namespace: &str, key: &str) -> Result<(), ChannelError> {
        self.hub
            .lock()
            .kv
            .remove(&(team.to_string(), namespace.to_string(), key.to_string()))
            .map(|_| ())
            .ok_or_else(|| ChannelError::EntryNotFound {
                team: team.to_string(),
                namespace: namespace.to_string(),
                key: key.to_string(),
            })
    }
}
