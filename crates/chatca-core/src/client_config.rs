//! Client configuration published by the authority into each team's key-value store

use serde::{Deserialize, Serialize};

/// Key-value namespace holding client configuration
pub const CLIENT_CONFIG_NAMESPACE: &str = "__sshca";

/// Key-value key holding client configuration
pub const CLIENT_CONFIG_KEY: &str = "kssh_config";

/// Where a client should send its requests
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Team to talk to the authority in
    #[serde(rename = "teamname")]
    pub team_name: String,

    /// Channel within the team; empty for the team's default conversation
    #[serde(rename = "channelname", default)]
    pub channel_name: String,

    /// Username of the authority
    #[serde(rename = "botname")]
    pub bot_name: String,
}

impl ClientConfig {
    /// Channel as an optional destination
    pub fn channel(&self) -> Option<&str> {
        if self.channel_name.is_empty() {
            None
        } else {
            Some(&self.channel_name)
        }
    }

    /// Parse a stored entry
    pub fn from_json(value: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(value)
    }

    /// Serialize for storage
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
