//! chatca signing - SSH certificate issuance for the chat-driven CA
//!
//! This crate wraps `ssh-keygen` to issue short-lived user certificates and
//! generate keys, inspects cached certificates, and keeps the hash-chained
//! audit log of everything the authority does.

pub mod audit;
pub mod certificate;
pub mod error;
pub mod provider;
pub mod providers;

pub use audit::{AuditAction, AuditEntry, AuditLog, AuditSink};
pub use certificate::{
    certificate_path, is_valid_cert, parse_certificate, public_key_path, CertificateInfo,
};
pub use error::{Result, SigningError};
pub use chatca_core::Expiration;
pub use provider::{CertificateRequest, CertificateSigner, KeyId};

// Re-export providers
pub use providers::ssh_keygen::{SshKeygen, SshKeygenSigner};
