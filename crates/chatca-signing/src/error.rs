//! Error types for signing operations

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for signing operations
pub type Result<T> = std::result::Result<T, SigningError>;

/// Signing-related errors
#[derive(Debug, Error)]
pub enum SigningError {
    /// Requester sent something that looks like a private key
    #[error("Refusing to sign: the submitted key looks like a private key")]
    PrivateKeySubmitted,

    /// Requester public key could not be parsed
    #[error("Invalid SSH public key: {0}")]
    InvalidPublicKey(String),

    /// No principals were authorized
    #[error("Refusing to sign a certificate without principals")]
    NoPrincipals,

    /// CA private key is missing
    #[error("CA key not found at {0}")]
    CaKeyNotFound(PathBuf),

    /// A key already exists where one would be generated
    #[error("Refusing to overwrite existing key at {0}")]
    KeyExists(PathBuf),

    /// Certificate could not be parsed
    #[error("Invalid certificate {path}: {reason}")]
    InvalidCertificate { path: PathBuf, reason: String },

    /// Tool not found
    #[error("Signing tool not found: {tool}. {hint}")]
    ToolNotFound { tool: String, hint: String },

    /// Tool execution failed; `reason` is the tool's raw diagnostic output
    #[error("Signing tool failed: {tool} - {reason}")]
    ToolFailed { tool: String, reason: String },

    /// Audit log could not be written
    #[error("Audit log error: {0}")]
    Audit(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
