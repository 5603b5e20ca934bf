//! Multi-approver consent for gated principals
//!
//! A gated signature request is parked here under the conversation and id of
//! the approval request message posted for it. Message ids are only unique
//! within a conversation. Reactions on that message advance it until
//! the threshold is met, at which point the record is handed back exactly
//! once and forgotten.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use chatca_core::config::ApprovalConfig;
use chatca_core::protocol::is_approval_emoji;
use chatca_core::{MessageId, SignatureRequest};
use tokio::time::Instant;
use tracing::debug;

use crate::error::{AuthorityError, Result};

/// Where to send the signature response once approved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyAddress {
    pub team: String,
    pub channel: Option<String>,
    pub conversation_id: String,
}

/// A gated request waiting for approvals
#[derive(Debug, Clone)]
pub struct OutstandingApproval {
    /// The original request, with verified sender fields
    pub request: SignatureRequest,

    /// Id of the posted approval request message
    pub message_id: MessageId,

    /// Approvers counted so far
    pub approvals: BTreeSet<String>,

    /// Where the response goes
    pub reply_to: ReplyAddress,

    /// When the approval request was posted
    pub created_at: Instant,
}

/// Result of recording a reaction
#[derive(Debug)]
pub enum ApprovalOutcome {
    /// Threshold reached; the record has been removed
    Approved(OutstandingApproval),
    /// Counted, more approvals needed
    Pending { approvals: usize, required: usize },
    /// Approver had already approved
    Duplicate,
    /// Reactor is not a configured approver
    NotApprover,
    /// Requester reacted on their own request
    SelfApproval,
    /// Emoji does not mean approval
    NotApprovalEmoji,
    /// No pending request for that message
    UnknownRequest,
}

/// Conversation id and message id of an approval request message
type ApprovalKey = (String, MessageId);

/// Tracks in-flight approval requests
#[derive(Debug)]
pub struct ApprovalCoordinator {
    pending: HashMap<ApprovalKey, OutstandingApproval>,
    approvers: Vec<String>,
    required: usize,
    ttl: Duration,
    max_pending: usize,
}

impl ApprovalCoordinator {
    /// Create a coordinator
    pub fn new(approvers: Vec<String>, required: usize, ttl: Duration, max_pending: usize) -> Self {
        Self {
            pending: HashMap::new(),
            approvers,
            required,
            ttl,
            max_pending,
        }
    }

    /// Create from configuration
    pub fn from_config(config: &ApprovalConfig) -> Self {
        Self::new(
            config.approvers.clone(),
            config.required_approvers,
            config.ttl(),
            config.max_pending,
        )
    }

    /// Configured approvers
    pub fn approvers(&self) -> &[String] {
        &self.approvers
    }

    /// Approvals needed
    pub fn required(&self) -> usize {
        self.required
    }

    /// Number of pending requests
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is pending
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Whether a pending request exists for the message in the conversation
    pub fn contains(&self, conversation_id: &str, message_id: MessageId) -> bool {
        self.pending
            .contains_key(&(conversation_id.to_string(), message_id))
    }

    /// Fail if no further request can be parked
    pub fn ensure_capacity(&self) -> Result<()> {
        if self.pending.len() >= self.max_pending {
            return Err(AuthorityError::TooManyPendingApprovals {
                limit: self.max_pending,
            });
        }
        Ok(())
    }

    /// Park a request under its approval message, which was posted in
    /// `reply_to.conversation_id`
    pub fn insert(
        &mut self,
        message_id: MessageId,
        request: SignatureRequest,
        reply_to: ReplyAddress,
    ) -> Result<()> {
        self.ensure_capacity()?;
        let key = (reply_to.conversation_id.clone(), message_id);
        if self.pending.contains_key(&key) {
            return Err(AuthorityError::DuplicateApprovalMessage {
                conversation_id: key.0,
                message_id,
            });
        }
        let entry = OutstandingApproval {
            request,
            message_id,
            approvals: BTreeSet::new(),
            reply_to,
            created_at: Instant::now(),
        };
        self.pending.insert(key, entry);
        Ok(())
    }

    /// Record a reaction from `reactor` in `conversation_id` on `target`
    pub fn record(
        &mut self,
        conversation_id: &str,
        target: MessageId,
        reactor: &str,
        emoji: &str,
    ) -> ApprovalOutcome {
        let key = (conversation_id.to_string(), target);
        let Some(entry) = self.pending.get_mut(&key) else {
            return ApprovalOutcome::UnknownRequest;
        };
        if !is_approval_emoji(emoji) {
            return ApprovalOutcome::NotApprovalEmoji;
        }
        if entry.request.username == reactor {
            return ApprovalOutcome::SelfApproval;
        }
        if !self.approvers.iter().any(|a| a == reactor) {
            return ApprovalOutcome::NotApprover;
        }
        if !entry.approvals.insert(reactor.to_string()) {
            return ApprovalOutcome::Duplicate;
        }

        let approvals = entry.approvals.len();
        debug!(message_id = target, approvals, required = self.required, "approval recorded");
        if approvals >= self.required {
            match self.pending.remove(&key) {
                Some(entry) => ApprovalOutcome::Approved(entry),
                None => ApprovalOutcome::UnknownRequest,
            }
        } else {
            ApprovalOutcome::Pending {
                approvals,
                required: self.required,
            }
        }
    }

    /// Remove and return every request older than the TTL at `now`
    pub fn expire(&mut self, now: Instant) -> Vec<OutstandingApproval> {
        let ttl = self.ttl;
        let expired: Vec<ApprovalKey> = self
            .pending
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.created_at) >= ttl)
            .map(|(key, _)| key.clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|key| self.pending.remove(&key))
            .collect()
    }
}

/// Text of the message asking approvers to react
pub fn approval_request_message(
    requester: &str,
    team: &str,
    approvers: &[String],
    required: usize,
) -> String {
    let mentions: Vec<String> = approvers.iter().map(|a| format!("@{}", a)).collect();
    format!(
        "@{} has requested access to the two-man realm `{}`. {}: react with :+1: to approve ({} approval{} required).",
        requester,
        team,
        mentions.join(", "),
        required,
        if required == 1 { "" } else { "s" }
    )
}
