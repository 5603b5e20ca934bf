//! [`MessagingChannel`] and [`KvStore`] over the Keybase CLI

use async_trait::async_trait;
use chatca_core::error::ChannelError;
use chatca_core::{KvStore, MessageRef, MessagingChannel, Subscription, TeamMembership};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::cli::{KeybaseCli, KeybaseOptions};
use crate::wire::{self, ApiError};

/// A logged-in Keybase identity
#[derive(Debug, Clone)]
pub struct KeybaseChannel {
    cli: KeybaseCli,
    username: String,
}

impl KeybaseChannel {
    /// Log in if requested and resolve the current username
    pub async fn connect(options: &KeybaseOptions) -> Result<Self, ChannelError> {
        let cli = KeybaseCli::new(options);
        if !cli.is_available() {
            return Err(ChannelError::Backend(
                "keybase not found on PATH; install Keybase or pass its location".to_string(),
            ));
        }

        if let Some((username, paperkey)) = &options.oneshot {
            info!(user = %username, "starting oneshot keybase session");
            cli.run_with_env(
                &["oneshot", "--username", username.as_str()],
                &[("KEYBASE_PAPERKEY", paperkey.as_str())],
            )
            .await?;
        }

        let status: wire::Status = serde_json::from_str(&cli.run(&["status", "--json"]).await?)
            .map_err(|e| ChannelError::Backend(format!("unexpected keybase status output: {}", e)))?;
        if !status.logged_in || status.username.is_empty() {
            return Err(ChannelError::Backend("keybase is not logged in".to_string()));
        }
        debug!(user = %status.username, "connected to keybase");

        Ok(Self {
            cli,
            username: status.username,
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        api: &str,
        request: &Value,
    ) -> Result<Result<T, ApiError>, ChannelError> {
        let raw = self.cli.api(api, request).await?;
        Ok(wire::decode_reply(&raw))
    }
}

fn lookup_error(team: &str, error: ApiError) -> ChannelError {
    ChannelError::Lookup {
        team: team.to_string(),
        reason: error.message,
    }
}

#[async_trait]
impl MessagingChannel for KeybaseChannel {
    fn username(&self) -> &str {
        &self.username
    }

    async fn send(
        &self,
        team: &str,
        channel: Option<&str>,
        body: &str,
    ) -> Result<MessageRef, ChannelError> {
        let sent: wire::SendResult = self
            .call("chat", &wire::send_request(team, channel, body))
            .await?
            .map_err(|e| ChannelError::Send {
                destination: match channel {
                    Some(channel) => format!("{}#{}", team, channel),
                    None => team.to_string(),
                },
                reason: e.message,
            })?;
        Ok(MessageRef { id: sent.id })
    }

    async fn subscribe(&self) -> Result<Subscription, ChannelError> {
        let mut child = self.cli.spawn_listener()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ChannelError::Subscribe("api-listen has no stdout".to_string()))?;
        let (tx, subscription) = Subscription::channel();

        tokio::spawn(async move {
            // Keeps the listener alive as long as this task runs
            let _child = child;
            let mut lines = BufReader::new(stdout).lines();
            loop {
                let item = match lines.next_line().await {
                    Ok(Some(line)) => match wire::parse_listen_line(&line) {
                        Ok(Some(message)) => Ok(message),
                        Ok(None) => continue,
                        Err(e) => {
                            warn!(error = %e, "skipping unreadable api-listen event");
                            continue;
                        }
                    },
                    Ok(None) => Err(ChannelError::Read("keybase chat api-listen exited".to_string())),
                    Err(e) => Err(ChannelError::Read(e.to_string())),
                };
                let fatal = item.is_err();
                if tx.send(item).await.is_err() || fatal {
                    return;
                }
            }
        });

        Ok(subscription)
    }

    async fn list_memberships(&self, username: &str) -> Result<Vec<TeamMembership>, ChannelError> {
        let teams: wire::UserTeams = self
            .call("team", &wire::list_user_teams_request(username))
            .await?
            .map_err(|e| lookup_error(username, e))?;
        Ok(teams.into_memberships())
    }

    async fn list_channels(&self, team: &str) -> Result<Vec<String>, ChannelError> {
        let list: wire::ConversationList = self
            .call("chat", &wire::list_channels_request(team))
            .await?
            .map_err(|e| lookup_error(team, e))?;
        Ok(list
            .conversations
            .into_iter()
            .map(|c| c.channel.topic_name)
            .collect())
    }

    async fn join_channel(&self, team: &str, channel: &str) -> Result<(), ChannelError> {
        self.call::<Value>("chat", &wire::join_request(team, channel))
            .await?
            .map_err(|e| lookup_error(team, e))?;
        Ok(())
    }

    async fn list_teams(&self) -> Result<Vec<String>, ChannelError> {
        let teams: wire::UserTeams = self
            .call("team", &wire::list_user_teams_request(&self.username))
            .await?
            .map_err(|e| lookup_error(&self.username, e))?;
        Ok(teams.readable())
    }
}

#[async_trait]
impl KvStore for KeybaseChannel {
    async fn put(
        &self,
        team: &str,
        namespace: &str,
        key: &str,
        value: &str,
    ) -> Result<(), ChannelError> {
        self.call::<Value>("kvstore", &wire::kv_request("put", team, namespace, key, Some(value)))
            .await?
            .map_err(|e| ChannelError::KvStore(e.message))?;
        Ok(())
    }

    async fn get(
        &self,
        team: &str,
        namespace: &str,
        key: &str,
    ) -> Result<Option<String>, ChannelError> {
        match self
            .call::<wire::KvEntry>("kvstore", &wire::kv_request("get", team, namespace, key, None))
            .await?
        {
            Ok(entry) => Ok(entry.value()),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(ChannelError::KvStore(e.message)),
        }
    }

    async fn delete(&self, team: &str, namespace: &str, key: &str) -> Result<(), ChannelError> {
        match self
            .call::<Value>("kvstore", &wire::kv_request("del", team, namespace, key, None))
            .await?
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Err(ChannelError::EntryNotFound {
                team: team.to_string(),
                namespace: namespace.to_string(),
                key: key.to_string(),
            }),
            Err(e) => Err(ChannelError::KvStore(e.message)),
        }
    }
}
