//! Error types for the client

use std::path::PathBuf;
use std::time::Duration;

use chatca_core::error::{ChannelError, ProtocolError};
use chatca_signing::SigningError;
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// Messaging channel failure
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// Unparseable message from the authority
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Key generation or certificate handling failed
    #[error(transparent)]
    Signing(#[from] SigningError),

    /// Client and authority share an identity
    #[error("Cannot run the client and the authority as the same user: {username}")]
    SameUser { username: String },

    /// A stored client config could not be used
    #[error("Invalid client config in team {team}: {reason}")]
    InvalidConfig { team: String, reason: String },

    /// No team carries a client config
    #[error("Did not find any client configs (is `chatca service` running?)")]
    NoConfigs,

    /// No client config names the requested bot
    #[error("Did not find a client config for bot {bot} (is the authority running and are you in the correct teams?)")]
    BotNotFound { bot: String },

    /// Configured default bot has no config in its team
    #[error("Failed to load the client config for default bot {bot} in team {team}")]
    DefaultBotNotFound { bot: String, team: String },

    /// Several bots found and none selected
    #[error(
        "Found {count} client configs ({names}) and no default bot is configured. \
         Either pick one with `chatssh --bot NAME` or set a default with `chatssh --set-default-bot NAME`"
    )]
    AmbiguousBots { count: usize, names: String },

    /// The authority did not answer in time
    #[error("Timed out after {}s waiting for a response from the authority", .after.as_secs())]
    Timeout { after: Duration },

    /// No home directory to keep keys and settings in
    #[error("Could not determine the home directory")]
    NoHomeDir,

    /// External tool not installed
    #[error("{tool} not found on PATH")]
    ToolNotFound { tool: String },

    /// External tool failed
    #[error("{tool} failed: {reason}")]
    ToolFailed { tool: String, reason: String },

    /// Local settings file is unreadable
    #[error("Failed to read local settings at {path}: {reason}")]
    LocalConfig { path: PathBuf, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
