//! Error types for the authority engine

use chatca_core::error::{ChannelError, ConfigError, ProtocolError};
use chatca_signing::SigningError;
use thiserror::Error;

/// Result type alias for authority operations
pub type Result<T> = std::result::Result<T, AuthorityError>;

/// Authority errors
#[derive(Debug, Error)]
pub enum AuthorityError {
    /// The message subscription could not be set up or read
    #[error("Message subscription failed: {0}")]
    Subscription(#[source] ChannelError),

    /// Any other messaging channel failure
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// Invalid configuration value
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Malformed protocol message
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Signing failed
    #[error(transparent)]
    Signing(#[from] SigningError),

    /// Audit log could not be written while strict logging is on
    #[error("Audit log failure: {0}")]
    Audit(#[source] SigningError),

    /// Requester qualifies for no principal
    #[error("User {username} is not authorized for any principal")]
    NoPrincipals { username: String },

    /// Too many approval requests are already open
    #[error("Too many pending approval requests (limit {limit}), try again later")]
    TooManyPendingApprovals { limit: usize },

    /// An approval request message id is already tracked in its conversation
    #[error("Approval message {message_id} is already pending in conversation {conversation_id}")]
    DuplicateApprovalMessage {
        conversation_id: String,
        message_id: u64,
    },

    /// Configured chat channel does not exist
    #[error("Channel {channel} not found in team {team}")]
    ChannelNotFound { team: String, channel: String },

    /// Authority identity is unknown
    #[error("Messaging channel reported an empty username")]
    EmptyUsername,

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AuthorityError {
    /// Whether the error ends the processing loop
    pub fn is_fatal(&self) -> bool {
        matches!(self, AuthorityError::Subscription(_) | AuthorityError::Audit(_))
    }
}
