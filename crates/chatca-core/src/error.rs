//! Error types for chatca

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using ChatCaError
pub type Result<T> = std::result::Result<T, ChatCaError>;

/// Main error type for chatca core operations
#[derive(Debug, Error)]
pub enum ChatCaError {
    /// Configuration-related errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Wire protocol errors
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Messaging channel errors
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found at {0}")]
    NotFound(PathBuf),

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {message}")]
    InvalidValue { field: String, message: String },

    /// Missing required field
    #[error("Missing required configuration field: {0}")]
    MissingField(String),

    /// Certificate lifetime is not `+<n><m|h|d|w>`
    #[error("Invalid expiration '{0}': expected +<number><m|h|d|w>, e.g. +1h")]
    InvalidExpiration(String),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// IO error
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors decoding or encoding protocol messages
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Body does not start with the expected preamble
    #[error("Message body is missing the '{0}' preamble")]
    MissingPreamble(&'static str),

    /// Payload after the preamble is not valid JSON for the message type
    #[error("Malformed {kind} payload: {source}")]
    MalformedPayload {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised by a messaging channel implementation
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Could not establish the subscription
    #[error("Failed to subscribe to messages: {0}")]
    Subscribe(String),

    /// The subscription stream failed or ended
    #[error("Failed to read message: {0}")]
    Read(String),

    /// Sending a message failed
    #[error("Failed to send message to {destination}: {reason}")]
    Send { destination: String, reason: String },

    /// A team lookup (members, channels) failed
    #[error("Team lookup failed for {team}: {reason}")]
    Lookup { team: String, reason: String },

    /// Key-value store entry does not exist
    #[error("No entry {namespace}/{key} in team {team}")]
    EntryNotFound {
        team: String,
        namespace: String,
        key: String,
    },

    /// Key-value store operation failed
    #[error("Key-value store error: {0}")]
    KvStore(String),

    /// Backend tool invocation failed
    #[error("Channel backend failed: {0}")]
    Backend(String),
}

impl ChannelError {
    /// Whether this error means the KV entry was simply absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, ChannelError::EntryNotFound { .. })
    }
}
