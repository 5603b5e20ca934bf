//! The authority's message processing loop

use std::sync::Arc;
use std::time::Duration;

use chatca_core::config::CaConfig;
use chatca_core::protocol::{self, Classified};
use chatca_core::{
    classify, InboundMessage, KvStore, MessageId, MessagingChannel, SignatureRequest,
    SignatureResponse,
};
use chatca_signing::{
    AuditAction, AuditLog, CertificateRequest, CertificateSigner, Expiration, KeyId,
};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::announcement::{build_announcement, AnnouncementValues};
use crate::approvals::{
    approval_request_message, ApprovalCoordinator, ApprovalOutcome, ReplyAddress,
};
use crate::client_config::{client_configs, delete_client_configs, ensure_chat_channel, publish_client_configs};
use crate::error::{AuthorityError, Result};
use crate::principals::{resolve_principals, TeamPrincipalConfig};

/// How often pending approvals are checked for expiry while the channel is idle
const EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Whether a message in `(team, channel)` is inside the authority's boundary.
///
/// With a fixed chat channel only that exact pair is accepted. Otherwise the
/// team must be one of the configured teams.
pub fn is_configured_team(config: &CaConfig, team: &str, channel: &str) -> bool {
    match config.chat_target() {
        Some((chat_team, chat_channel)) => team == chat_team && channel == chat_channel,
        None => config.teams.iter().any(|t| t == team),
    }
}

/// Certificate authority serving signature requests over a messaging channel
pub struct Authority<C, S> {
    channel: Arc<C>,
    signer: S,
    config: CaConfig,
    principals: TeamPrincipalConfig,
    approvals: ApprovalCoordinator,
    expiration: Expiration,
    audit: AuditLog,
}

impl<C, S> Authority<C, S>
where
    C: MessagingChannel + KvStore + 'static,
    S: CertificateSigner,
{
    /// Create an authority from a validated configuration
    pub fn new(channel: Arc<C>, signer: S, config: CaConfig, audit: AuditLog) -> Result<Self> {
        let expiration: Expiration = config.key_expiration.parse()?;
        Ok(Self {
            principals: TeamPrincipalConfig::from_config(&config),
            approvals: ApprovalCoordinator::from_config(&config.approval),
            channel,
            signer,
            config,
            expiration,
            audit,
        })
    }

    /// The configuration in use
    pub fn config(&self) -> &CaConfig {
        &self.config
    }

    /// Number of gated requests waiting for approval
    pub fn pending_approvals(&self) -> usize {
        self.approvals.len()
    }

    fn username(&self) -> &str {
        self.channel.username()
    }

    fn audit(&mut self, actor: &str, action: AuditAction) -> Result<()> {
        self.audit.record(actor, action).map_err(AuthorityError::Audit)
    }

    /// Publish client configs, subscribe, announce, then process messages
    /// until the subscription fails.
    pub async fn run(&mut self) -> Result<()> {
        let username = self.username().to_string();
        if username.is_empty() {
            return Err(AuthorityError::EmptyUsername);
        }

        if let Some((team, channel)) = self.config.chat_target() {
            ensure_chat_channel(self.channel.as_ref(), team, channel).await?;
        }

        let entries = client_configs(&self.config, &username);
        let teams: Vec<String> = entries.iter().map(|(t, _)| t.clone()).collect();
        publish_client_configs(self.channel.clone(), entries).await?;
        self.audit(&username, AuditAction::ClientConfigsWritten { teams })?;

        let mut subscription = self
            .channel
            .subscribe()
            .await
            .map_err(AuthorityError::Subscription)?;

        self.announce().await?;
        self.audit(
            &username,
            AuditAction::ServiceStarted {
                teams: self.config.teams.clone(),
            },
        )?;
        info!(user = %username, teams = ?self.config.teams, "authority listening for messages");

        let mut sweep = tokio::time::interval(EXPIRY_SWEEP_INTERVAL);
        loop {
            tokio::select! {
                message = subscription.next() => {
                    let message = message.map_err(AuthorityError::Subscription)?;
                    self.expire_approvals(Instant::now()).await?;
                    if let Err(e) = self.handle(&message).await {
                        if e.is_fatal() {
                            return Err(e);
                        }
                        self.report_error(&message, &e).await?;
                    }
                }
                _ = sweep.tick() => {
                    self.expire_approvals(Instant::now()).await?;
                }
            }
        }
    }

    /// Remove the client configs this authority published
    pub async fn shutdown(&mut self) -> Result<Vec<String>> {
        let teams = self.config.client_config_teams();
        let found = delete_client_configs(self.channel.clone(), teams).await?;
        let username = self.username().to_string();
        self.audit(
            &username,
            AuditAction::ClientConfigsDeleted {
                teams: found.clone(),
            },
        )?;
        self.audit(&username, AuditAction::ServiceStopped)?;
        Ok(found)
    }

    /// Send the configured announcement to every configured team
    pub async fn announce(&self) -> Result<()> {
        let Some(template) = self.config.announcement.as_deref() else {
            return Ok(());
        };

        for team in &self.config.teams {
            let body = build_announcement(
                template,
                AnnouncementValues {
                    username: self.username(),
                    current_team: team,
                    teams: &self.config.teams,
                },
            );
            self.channel.send(team, None, &body).await?;
        }
        Ok(())
    }

    /// Process one inbound message
    pub async fn handle(&mut self, message: &InboundMessage) -> Result<()> {
        let own_username = self.username().to_string();
        if message.sender.username == own_username {
            if message.text().is_some_and(protocol::is_client_message) {
                warn!(
                    "Ignoring AckRequest/SignatureRequest sent by the authority's own user; \
                     are the client and the authority running as the same user?"
                );
            }
            return Ok(());
        }

        if !is_configured_team(&self.config, &message.team, &message.channel) {
            debug!(team = %message.team, channel = %message.channel, "skipping message outside configured teams");
            return Ok(());
        }

        match classify(message, &own_username) {
            Classified::Ping => {
                debug!("responding to ping");
                self.reply(message, &protocol::ping_response(&message.sender.username))
                    .await?;
            }
            Classified::AckRequest { body, .. } => {
                self.reply(message, &protocol::ack_response(body)).await?;
            }
            Classified::SignatureRequest(body) => {
                let mut request = SignatureRequest::parse(body)?;
                request.username = message.sender.username.clone();
                request.device_name = message.sender.device_name.clone();
                self.handle_signature_request(message, request).await?;
            }
            Classified::Reaction { emoji, target } => {
                self.handle_reaction(message, emoji, target).await?;
            }
            Classified::AckResponse { .. } | Classified::SignatureResponse(_) | Classified::Unknown => {
                debug!(id = message.id, "ignoring message");
            }
        }
        Ok(())
    }

    async fn reply(&self, message: &InboundMessage, body: &str) -> Result<()> {
        self.channel
            .send(&message.team, message.channel_opt(), body)
            .await?;
        Ok(())
    }

    async fn handle_signature_request(
        &mut self,
        message: &InboundMessage,
        request: SignatureRequest,
    ) -> Result<()> {
        self.audit(
            &request.username,
            AuditAction::SignatureRequested {
                uuid: request.uuid.clone(),
                device: request.device_name.clone(),
                requested_principal: request.requested_principal.clone(),
            },
        )?;

        let reply_to = ReplyAddress {
            team: message.team.clone(),
            channel: message.channel_opt().map(str::to_string),
            conversation_id: message.conversation_id.clone(),
        };

        if !self.principals.requests_gated(&request) {
            return self.sign_and_reply(request, &reply_to, false).await;
        }

        if let Err(e) = self.approvals.ensure_capacity() {
            self.audit(
                &request.username,
                AuditAction::SignatureRejected {
                    uuid: request.uuid.clone(),
                    reason: e.to_string(),
                },
            )?;
            return Err(e);
        }

        let body = approval_request_message(
            &request.username,
            &request.requested_principal,
            self.approvals.approvers(),
            self.approvals.required(),
        );
        let posted = self
            .channel
            .send(&reply_to.team, reply_to.channel.as_deref(), &body)
            .await?;

        let (username, uuid, team) = (
            request.username.clone(),
            request.uuid.clone(),
            request.requested_principal.clone(),
        );
        self.approvals.insert(posted.id, request, reply_to)?;
        self.audit(
            &username,
            AuditAction::ApprovalRequested {
                uuid,
                team,
                message_id: posted.id,
            },
        )?;
        Ok(())
    }

    async fn handle_reaction(
        &mut self,
        message: &InboundMessage,
        emoji: &str,
        target: MessageId,
    ) -> Result<()> {
        if !self.approvals.contains(&message.conversation_id, target) {
            return Ok(());
        }

        let reactor = message.sender.username.clone();
        match self
            .approvals
            .record(&message.conversation_id, target, &reactor, emoji)
        {
            ApprovalOutcome::Approved(entry) => {
                self.audit(
                    &reactor,
                    AuditAction::ApprovalRecorded {
                        message_id: target,
                        approver: reactor.clone(),
                    },
                )?;
                info!(message_id = target, "approval threshold reached");
                self.sign_and_reply(entry.request, &entry.reply_to, true)
                    .await?;
            }
            ApprovalOutcome::Pending { approvals, required } => {
                debug!(message_id = target, approvals, required, "approval pending");
                self.audit(
                    &reactor,
                    AuditAction::ApprovalRecorded {
                        message_id: target,
                        approver: reactor.clone(),
                    },
                )?;
            }
            ApprovalOutcome::NotApprover => {
                self.ignore_reaction(target, &reactor, "not a configured approver")?;
            }
            ApprovalOutcome::SelfApproval => {
                self.ignore_reaction(target, &reactor, "requesters cannot approve their own request")?;
            }
            ApprovalOutcome::Duplicate
            | ApprovalOutcome::NotApprovalEmoji
            | ApprovalOutcome::UnknownRequest => {
                debug!(message_id = target, reactor = %reactor, "reaction does not change approval state");
            }
        }
        Ok(())
    }

    fn ignore_reaction(&mut self, target: MessageId, reactor: &str, reason: &str) -> Result<()> {
        warn!(message_id = target, reactor = %reactor, reason, "ignoring reaction");
        self.audit(
            reactor,
            AuditAction::ApprovalIgnored {
                message_id: target,
                reactor: reactor.to_string(),
                reason: reason.to_string(),
            },
        )
    }

    async fn sign_and_reply(
        &mut self,
        request: SignatureRequest,
        reply_to: &ReplyAddress,
        gated_approved: bool,
    ) -> Result<()> {
        let principals = match resolve_principals(
            self.channel.as_ref(),
            &self.principals,
            &request,
            gated_approved,
        )
        .await
        {
            Ok(principals) => principals,
            Err(e) => {
                self.audit(
                    &request.username,
                    AuditAction::SignatureRejected {
                        uuid: request.uuid.clone(),
                        reason: e.to_string(),
                    },
                )?;
                return Err(e);
            }
        };

        let cert_request = CertificateRequest {
            key_id: KeyId::new(&request.uuid, &request.username),
            principals,
            expiration: self.expiration,
            public_key: request.ssh_public_key.clone(),
        };
        let signed_key = self.signer.sign(&cert_request).await?;

        let response = SignatureResponse {
            signed_key,
            uuid: request.uuid.clone(),
        };
        self.channel
            .send(
                &reply_to.team,
                reply_to.channel.as_deref(),
                &response.to_message()?,
            )
            .await?;

        self.audit(
            &request.username,
            AuditAction::CertificateIssued {
                uuid: request.uuid,
                key_id: cert_request.key_id.to_string(),
                principals: cert_request.principal_list(),
            },
        )
    }

    async fn expire_approvals(&mut self, now: Instant) -> Result<()> {
        for entry in self.approvals.expire(now) {
            info!(message_id = entry.message_id, requester = %entry.request.username, "approval request expired");
            self.audit(
                &entry.request.username,
                AuditAction::ApprovalExpired {
                    message_id: entry.message_id,
                    requester: entry.request.username.clone(),
                },
            )?;
            let notice = format!(
                "@{}: approval request for `{}` expired without enough approvals",
                entry.request.username, entry.request.requested_principal
            );
            if let Err(e) = self
                .channel
                .send(&entry.reply_to.team, entry.reply_to.channel.as_deref(), &notice)
                .await
            {
                warn!(error = %e, "failed to announce approval expiry");
            }
        }
        Ok(())
    }

    async fn report_error(&mut self, message: &InboundMessage, error: &AuthorityError) -> Result<()> {
        let text = format!(
            "Encountered error while processing message from {} (messageID:{}): {}",
            message.sender.username, message.id, error
        );
        warn!("{}", text);
        self.audit(
            &message.sender.username,
            AuditAction::MessageFailed {
                message_id: message.id,
                error: error.to_string(),
            },
        )?;
        if let Err(e) = self.reply(message, &text).await {
            warn!(error = %e, "failed to report error to chat");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(chat_channel: Option<&str>) -> CaConfig {
        CaConfig {
            teams: vec!["infra.ssh".to_string(), "infra.ssh.prod".to_string()],
            chat_channel: chat_channel.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_fixed_channel_requires_exact_pair() {
        let config = config(Some("infra.ssh#general"));
        assert!(is_configured_team(&config, "infra.ssh", "general"));
        assert!(!is_configured_team(&config, "infra.ssh", "random"));
        assert!(!is_configured_team(&config, "other.ssh", "general"));
        assert!(!is_configured_team(&config, "infra.ssh.prod", "general"));
    }

    #[test]
    fn test_team_list_boundary() {
        let config = config(None);
        assert!(is_configured_team(&config, "infra.ssh", ""));
        assert!(is_configured_team(&config, "infra.ssh.prod", "anything"));
        assert!(!is_configured_team(&config, "infra", ""));
        assert!(!is_configured_team(&config, "infra.ssh.prod.evil", ""));
    }
}
