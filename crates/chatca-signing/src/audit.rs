//! Audit logging for the certificate authority
//!
//! Every entry carries the hash of the previous one, so a log file that has
//! been edited after the fact fails [`verify_chain`]. Entries are appended as
//! JSON lines to the configured file, or printed to stdout when no file is
//! configured.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Result, SigningError};

/// An action that can be audited
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Authority started listening
    ServiceStarted { teams: Vec<String> },
    /// Authority stopped
    ServiceStopped,

    /// Signature request received
    SignatureRequested {
        uuid: String,
        device: String,
        requested_principal: String,
    },
    /// Certificate issued
    CertificateIssued {
        uuid: String,
        key_id: String,
        principals: String,
    },
    /// Signature request refused
    SignatureRejected { uuid: String, reason: String },

    /// Approval request posted for a gated principal
    ApprovalRequested {
        uuid: String,
        team: String,
        message_id: u64,
    },
    /// Approval counted
    ApprovalRecorded { message_id: u64, approver: String },
    /// Reaction on an approval request that did not count
    ApprovalIgnored {
        message_id: u64,
        reactor: String,
        reason: String,
    },
    /// Pending approval dropped after its deadline
    ApprovalExpired { message_id: u64, requester: String },

    /// CA key generated
    KeyGenerated { path: String },
    /// CA private key printed for backup
    KeyExported { path: String },

    /// Client configuration written to team key-value stores
    ClientConfigsWritten { teams: Vec<String> },
    /// Client configuration removed from team key-value stores
    ClientConfigsDeleted { teams: Vec<String> },

    /// Processing of one message failed
    MessageFailed { message_id: u64, error: String },
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditAction::ServiceStarted { teams } => {
                write!(f, "Service started for teams: {}", teams.join(", "))
            }
            AuditAction::ServiceStopped => write!(f, "Service stopped"),
            AuditAction::SignatureRequested {
                uuid,
                device,
                requested_principal,
            } => {
                if requested_principal.is_empty() {
                    write!(f, "Signature request {} from device {}", uuid, device)
                } else {
                    write!(
                        f,
                        "Signature request {} from device {} for {}",
                        uuid, device, requested_principal
                    )
                }
            }
            AuditAction::CertificateIssued {
                uuid,
                key_id,
                principals,
            } => write!(
                f,
                "Issued certificate for {} (key id {}, principals {})",
                uuid, key_id, principals
            ),
            AuditAction::SignatureRejected { uuid, reason } => {
                write!(f, "Rejected signature request {}: {}", uuid, reason)
            }
            AuditAction::ApprovalRequested {
                uuid,
                team,
                message_id,
            } => write!(
                f,
                "Approval for {} requested for {} (message {})",
                team, uuid, message_id
            ),
            AuditAction::ApprovalRecorded {
                message_id,
                approver,
            } => write!(f, "{} approved message {}", approver, message_id),
            AuditAction::ApprovalIgnored {
                message_id,
                reactor,
                reason,
            } => write!(
                f,
                "Ignored reaction by {} on message {}: {}",
                reactor, message_id, reason
            ),
            AuditAction::ApprovalExpired {
                message_id,
                requester,
            } => write!(
                f,
                "Approval request {} from {} expired",
                message_id, requester
            ),
            AuditAction::KeyGenerated { path } => write!(f, "Generated CA key at {}", path),
            AuditAction::KeyExported { path } => write!(f, "Exported CA key at {}", path),
            AuditAction::ClientConfigsWritten { teams } => {
                write!(f, "Wrote client config to: {}", teams.join(", "))
            }
            AuditAction::ClientConfigsDeleted { teams } => {
                write!(f, "Deleted client config from: {}", teams.join(", "))
            }
            AuditAction::MessageFailed { message_id, error } => {
                write!(f, "Error processing message {}: {}", message_id, error)
            }
        }
    }
}

/// A single audit log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique entry ID
    pub id: Uuid,

    /// When the action occurred
    pub timestamp: DateTime<Utc>,

    /// Who performed the action
    pub actor: String,

    /// What action was performed
    pub action: AuditAction,

    /// Machine/hostname where action occurred
    pub machine: Option<String>,

    /// Hash of previous entry for integrity chain
    pub prev_hash: Option<String>,

    /// Hash of this entry
    pub hash: String,
}

impl AuditEntry {
    /// Create a new audit entry
    pub fn new(actor: impl Into<String>, action: AuditAction, prev_hash: Option<String>) -> Self {
        let id = Uuid::new_v4();
        let timestamp = Utc::now();
        let actor = actor.into();
        let machine = hostname::get()
            .ok()
            .map(|h| h.to_string_lossy().to_string());
        let hash = Self::compute_hash(&id, &timestamp, &actor, &action, prev_hash.as_deref());

        Self {
            id,
            timestamp,
            actor,
            action,
            machine,
            prev_hash,
            hash,
        }
    }

    fn compute_hash(
        id: &Uuid,
        timestamp: &DateTime<Utc>,
        actor: &str,
        action: &AuditAction,
        prev_hash: Option<&str>,
    ) -> String {
        let hash_input = format!(
            "{}:{}:{}:{:?}:{}",
            id,
            timestamp.timestamp_nanos_opt().unwrap_or(0),
            actor,
            action,
            prev_hash.unwrap_or("")
        );
        let mut hasher = Sha256::new();
        hasher.update(hash_input.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Verify the hash of this entry
    pub fn verify_hash(&self) -> bool {
        Self::compute_hash(
            &self.id,
            &self.timestamp,
            &self.actor,
            &self.action,
            self.prev_hash.as_deref(),
        ) == self.hash
    }
}

/// Where entries are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditSink {
    /// Append JSON lines to a file
    File(PathBuf),
    /// Print one line per entry to stdout
    Stdout,
}

/// Append-only, hash-chained audit log
#[derive(Debug)]
pub struct AuditLog {
    sink: AuditSink,
    strict: bool,
    last_hash: Option<String>,
}

impl AuditLog {
    /// Log to stdout
    pub fn stdout() -> Self {
        Self {
            sink: AuditSink::Stdout,
            strict: false,
            last_hash: None,
        }
    }

    /// Log to a file, continuing the chain of any entries already in it.
    ///
    /// With `strict`, a failed append is returned as an error instead of
    /// being logged and skipped.
    pub fn open(path: impl Into<PathBuf>, strict: bool) -> Result<Self> {
        let path = path.into();
        let last_hash = if path.exists() {
            read_entries(&path)?.last().map(|e| e.hash.clone())
        } else {
            None
        };

        Ok(Self {
            sink: AuditSink::File(path),
            strict,
            last_hash,
        })
    }

    /// Build from an optional log location
    pub fn from_location(location: Option<&Path>, strict: bool) -> Result<Self> {
        match location {
            Some(path) => Self::open(path, strict),
            None => Ok(Self::stdout()),
        }
    }

    /// The configured sink
    pub fn sink(&self) -> &AuditSink {
        &self.sink
    }

    /// Whether write failures are fatal
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Record an action
    pub fn record(&mut self, actor: impl Into<String>, action: AuditAction) -> Result<()> {
        let entry = AuditEntry::new(actor, action, self.last_hash.clone());
        info!(actor = %entry.actor, action = %entry.action, "audit");

        match self.write(&entry) {
            Ok(()) => {
                self.last_hash = Some(entry.hash);
                Ok(())
            }
            Err(e) if self.strict => Err(SigningError::Audit(e.to_string())),
            Err(e) => {
                warn!(error = %e, "failed to write audit entry");
                Ok(())
            }
        }
    }

    fn write(&self, entry: &AuditEntry) -> std::io::Result<()> {
        match &self.sink {
            AuditSink::Stdout => {
                let mut out = std::io::stdout().lock();
                writeln!(
                    out,
                    "[{}] {}: {}",
                    entry.timestamp.to_rfc3339(),
                    entry.actor,
                    entry.action
                )
            }
            AuditSink::File(path) => {
                let line = serde_json::to_string(entry)
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
                let mut file = OpenOptions::new().create(true).append(true).open(path)?;
                writeln!(file, "{}", line)
            }
        }
    }
}

/// Read every entry from a JSON-lines audit file
pub fn read_entries(path: &Path) -> Result<Vec<AuditEntry>> {
    let content = std::fs::read_to_string(path)?;
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(SigningError::from))
        .collect()
}

/// Verify the integrity of a sequence of entries
pub fn verify_chain(entries: &[AuditEntry]) -> std::result::Result<(), AuditIntegrityError> {
    let mut prev_hash: Option<&str> = None;

    for (i, entry) in entries.iter().enumerate() {
        if !entry.verify_hash() {
            return Err(AuditIntegrityError::InvalidHash { index: i });
        }

        if entry.prev_hash.as_deref() != prev_hash {
            return Err(AuditIntegrityError::BrokenChain { index: i });
        }

        prev_hash = Some(&entry.hash);
    }

    Ok(())
}

/// Errors when verifying audit log integrity
#[derive(Debug, thiserror::Error)]
pub enum AuditIntegrityError {
    #[error("Invalid hash at entry index {index}")]
    InvalidHash { index: usize },

    #[error("Broken chain at entry index {index}")]
    BrokenChain { index: usize },
}
