//! Messaging channel and key-value store contracts
//!
//! The authority and the client only talk to the outside world through these
//! two traits. Concrete backends live in their own crates; [`memory`] is an
//! in-process implementation used by tests.

pub mod memory;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::ChannelError;
use crate::message::{InboundMessage, MessageRef};
use crate::roles::TeamMembership;

/// Buffer size for subscription queues
pub const SUBSCRIPTION_BUFFER: usize = 1024;

/// A live, non-restartable subscription to inbound messages.
///
/// The stream is conceptually infinite: if the backend closes it, the next
/// read fails, and callers treat that as fatal.
pub struct Subscription {
    rx: mpsc::Receiver<Result<InboundMessage, ChannelError>>,
}

impl Subscription {
    /// Create a subscription with its feeding half
    pub fn channel() -> (mpsc::Sender<Result<InboundMessage, ChannelError>>, Self) {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        (tx, Self { rx })
    }

    /// Read the next message
    pub async fn next(&mut self) -> Result<InboundMessage, ChannelError> {
        match self.rx.recv().await {
            Some(item) => item,
            None => Err(ChannelError::Read("subscription closed".to_string())),
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

/// Team/channel addressed messaging service
#[async_trait]
pub trait MessagingChannel: Send + Sync {
    /// Identity this channel is authenticated as
    fn username(&self) -> &str;

    /// Send a text message to a team, optionally to a specific channel
    async fn send(
        &self,
        team: &str,
        channel: Option<&str>,
        body: &str,
    ) -> Result<MessageRef, ChannelError>;

    /// Subscribe to inbound messages from every conversation this identity can see
    async fn subscribe(&self) -> Result<Subscription, ChannelError>;

    /// List every team `username` belongs to, with their role in it.
    ///
    /// Only teams visible to this identity are reported.
    async fn list_memberships(&self, username: &str) -> Result<Vec<TeamMembership>, ChannelError>;

    /// List the channel names of a team
    async fn list_channels(&self, team: &str) -> Result<Vec<String>, ChannelError>;

    /// Join a channel of a team
    async fn join_channel(&self, team: &str, channel: &str) -> Result<(), ChannelError>;

    /// List the teams this identity can read
    async fn list_teams(&self) -> Result<Vec<String>, ChannelError>;
}

/// Per-team key-value store
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Write an entry
    async fn put(
        &self,
        team: &str,
        namespace: &str,
        key: &str,
        value: &str,
    ) -> Result<(), ChannelError>;

    /// Read an entry, `None` if it does not exist
    async fn get(
        &self,
        team: &str,
        namespace: &str,
        key: &str,
    ) -> Result<Option<String>, ChannelError>;

    /// Delete an entry; fails with [`ChannelError::EntryNotFound`] if absent
    async fn delete(&self, team: &str, namespace: &str, key: &str) -> Result<(), ChannelError>;
}
