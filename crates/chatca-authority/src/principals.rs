//! Principal resolution from team membership

use std::collections::HashMap;

use chatca_core::config::CaConfig;
use chatca_core::{MessagingChannel, SignatureRequest, TeamRole};
use tracing::debug;

use crate::error::{AuthorityError, Result};

/// Teams usable as principals and which of them are gated behind approval
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeamPrincipalConfig {
    /// Every eligible team, in configured order
    pub teams: Vec<String>,

    /// Teams that require approval
    pub gated_teams: Vec<String>,

    /// Users whose approval counts
    pub approvers: Vec<String>,

    /// Approvals needed
    pub required_approvers: usize,
}

impl TeamPrincipalConfig {
    /// Build from the authority configuration
    pub fn from_config(config: &CaConfig) -> Self {
        Self {
            teams: config.teams.clone(),
            gated_teams: config.approval.two_man_teams.clone(),
            approvers: config.approval.approvers.clone(),
            required_approvers: config.approval.required_approvers,
        }
    }

    /// Whether the team requires approval
    pub fn is_gated(&self, team: &str) -> bool {
        self.gated_teams.iter().any(|t| t == team)
    }

    /// Whether the request asks for a gated principal
    pub fn requests_gated(&self, request: &SignatureRequest) -> bool {
        !request.requested_principal.is_empty() && self.is_gated(&request.requested_principal)
    }
}

/// Look up a user's role in every team they belong to
pub async fn team_roles<C>(channel: &C, username: &str) -> Result<HashMap<String, TeamRole>>
where
    C: MessagingChannel + ?Sized,
{
    let memberships = channel.list_memberships(username).await?;
    Ok(memberships.into_iter().map(|m| (m.team, m.role)).collect())
}

/// Resolve the principals a request may receive.
///
/// Membership is looked up fresh on every call, with a single lookup for
/// the requester. Non-gated teams count when
/// the requester is a writer or above. A gated team counts only when it is
/// the explicitly requested principal, the requester qualifies in it, and
/// `gated_approved` is set. An empty result is an authorization failure.
pub async fn resolve_principals<C>(
    channel: &C,
    config: &TeamPrincipalConfig,
    request: &SignatureRequest,
    gated_approved: bool,
) -> Result<Vec<String>>
where
    C: MessagingChannel + ?Sized,
{
    let roles = team_roles(channel, &request.username).await?;
    let mut principals = Vec::new();

    for team in &config.teams {
        if config.is_gated(team) && !(gated_approved && request.requested_principal == *team) {
            continue;
        }

        let role = roles.get(team).copied();
        debug!(team = %team, user = %request.username, role = ?role, "checked membership");
        if role.is_some_and(|r| r.grants_principal()) {
            principals.push(team.clone());
        }
    }

    if principals.is_empty() {
        return Err(AuthorityError::NoPrincipals {
            username: request.username.clone(),
        });
    }
    Ok(principals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatca_core::MemoryHub;

    fn config() -> TeamPrincipalConfig {
        TeamPrincipalConfig {
            teams: vec![
                "infra.ssh".to_string(),
                "infra.ssh.staging".to_string(),
                "infra.ssh.root".to_string(),
            ],
            gated_teams: vec!["infra.ssh.root".to_string()],
            approvers: vec!["bob".to_string(), "carol".to_string()],
            required_approvers: 2,
        }
    }

    fn request(principal: &str) -> SignatureRequest {
        let mut request = SignatureRequest::new("ssh-ed25519 AAAA", "u-1")
            .with_requested_principal(principal);
        request.username = "alice".to_string();
        request
    }

    fn hub() -> MemoryHub {
        let hub = MemoryHub::new();
        hub.set_role("infra.ssh", "alice", TeamRole::Writer);
        hub.set_role("infra.ssh.staging", "alice", TeamRole::Reader);
        hub.set_role("infra.ssh.root", "alice", TeamRole::Owner);
        hub
    }

    #[tokio::test]
    async fn test_writer_and_above_only() {
        let hub = hub();
        let channel = hub.connect("cabot", "server");
        let principals = resolve_principals(&channel, &config(), &request(""), false)
            .await
            .unwrap();
        assert_eq!(principals, vec!["infra.ssh"]);
    }

    #[tokio::test]
    async fn test_empty_request_never_gets_gated_team() {
        let hub = hub();
        let channel = hub.connect("cabot", "server");
        // Even with approval set, an empty requested principal excludes gated teams
        let principals = resolve_principals(&channel, &config(), &request(""), true)
            .await
            .unwrap();
        assert!(!principals.contains(&"infra.ssh.root".to_string()));
    }

    #[tokio::test]
    async fn test_gated_team_requires_approval() {
        let hub = hub();
        let channel = hub.connect("cabot", "server");
        let config = config();

        let unapproved = resolve_principals(&channel, &config, &request("infra.ssh.root"), false)
            .await
            .unwrap();
        assert_eq!(unapproved, vec!["infra.ssh"]);

        let approved = resolve_principals(&channel, &config, &request("infra.ssh.root"), true)
            .await
            .unwrap();
        assert_eq!(approved, vec!["infra.ssh", "infra.ssh.root"]);
    }

    #[tokio::test]
    async fn test_approved_gated_team_still_needs_membership() {
        let hub = hub();
        hub.set_role("infra.ssh.root", "alice", TeamRole::Reader);
        let channel = hub.connect("cabot", "server");
        let principals = resolve_principals(&channel, &config(), &request("infra.ssh.root"), true)
            .await
            .unwrap();
        assert_eq!(principals, vec!["infra.ssh"]);
    }

    #[tokio::test]
    async fn test_no_qualifying_team_is_rejected() {
        let hub = MemoryHub::new();
        hub.set_role("infra.ssh", "alice", TeamRole::Bot);
        let channel = hub.connect("cabot", "server");
        assert!(matches!(
            resolve_principals(&channel, &config(), &request(""), false).await,
            Err(AuthorityError::NoPrincipals { .. })
        ));
    }

    /// Counts membership lookups made through an inner channel
    struct CountingChannel {
        inner: chatca_core::MemoryChannel,
        lookups: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl MessagingChannel for CountingChannel {
        fn username(&self) -> &str {
            self.inner.username()
        }

        async fn send(
            &self,
            team: &str,
            channel: Option<&str>,
            body: &str,
        ) -> std::result::Result<chatca_core::MessageRef, chatca_core::ChannelError> {
            self.inner.send(team, channel, body).await
        }

        async fn subscribe(
            &self,
        ) -> std::result::Result<chatca_core::Subscription, chatca_core::ChannelError> {
            self.inner.subscribe().await
        }

        async fn list_memberships(
            &self,
            username: &str,
        ) -> std::result::Result<Vec<chatca_core::TeamMembership>, chatca_core::ChannelError> {
            self.lookups
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.inner.list_memberships(username).await
        }

        async fn list_channels(
            &self,
            team: &str,
        ) -> std::result::Result<Vec<String>, chatca_core::ChannelError> {
            self.inner.list_channels(team).await
        }

        async fn join_channel(
            &self,
            team: &str,
            channel: &str,
        ) -> std::result::Result<(), chatca_core::ChannelError> {
            self.inner.join_channel(team, channel).await
        }

        async fn list_teams(&self) -> std::result::Result<Vec<String>, chatca_core::ChannelError> {
            self.inner.list_teams().await
        }
    }

    #[tokio::test]
    async fn test_one_membership_lookup_per_request() {
        let hub = hub();
        let channel = CountingChannel {
            inner: hub.connect("cabot", "server"),
            lookups: Default::default(),
        };
        let principals = resolve_principals(&channel, &config(), &request("infra.ssh.root"), true)
            .await
            .unwrap();
        assert_eq!(principals, vec!["infra.ssh", "infra.ssh.root"]);
        assert_eq!(
            channel.lookups.load(std::sync::atomic::Ordering::SeqCst),
            1
        );
    }

    #[tokio::test]
    async fn test_membership_is_not_cached() {
        let hub = hub();
        let channel = hub.connect("cabot", "server");
        let config = config();
        assert!(resolve_principals(&channel, &config, &request(""), false).await.is_ok());

        hub.remove_member("infra.ssh", "alice");
        assert!(resolve_principals(&channel, &config, &request(""), false).await.is_err());
    }
}
