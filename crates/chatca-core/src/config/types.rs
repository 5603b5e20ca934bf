//! Configuration types

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::defaults::{
    DEFAULT_APPROVAL_TTL_SECS, DEFAULT_CA_KEY_LOCATION, DEFAULT_KEY_EXPIRATION,
    DEFAULT_MAX_PENDING_APPROVALS,
};

/// Main configuration for the certificate authority
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaConfig {
    /// Path to the CA private key
    pub ca_key_location: PathBuf,

    /// Certificate lifetime, `+<n><m|h|d|w>`
    pub key_expiration: String,

    /// Teams whose writers may request certificates; each is usable as a principal
    pub teams: Vec<String>,

    /// Fixed `team#channel` the authority listens on, instead of every configured team
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_channel: Option<String>,

    /// Audit log file; entries go to stdout when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_location: Option<PathBuf>,

    /// Treat audit log write failures as fatal
    pub strict_logging: bool,

    /// Message sent to every configured team on startup
    #[serde(skip_serializing_if = "Option::is_none")]
    pub announcement: Option<String>,

    /// Multi-approver settings
    pub approval: ApprovalConfig,

    /// Messaging service account settings
    pub keybase: KeybaseConfig,
}

impl Default for CaConfig {
    fn default() -> Self {
        Self {
            ca_key_location: PathBuf::from(DEFAULT_CA_KEY_LOCATION),
            key_expiration: DEFAULT_KEY_EXPIRATION.to_string(),
            teams: Vec::new(),
            chat_channel: None,
            log_location: None,
            strict_logging: false,
            announcement: None,
            approval: ApprovalConfig::default(),
            keybase: KeybaseConfig::default(),
        }
    }
}

impl CaConfig {
    /// The fixed `(team, channel)` pair, if one is configured
    pub fn chat_target(&self) -> Option<(&str, &str)> {
        self.chat_channel
            .as_deref()
            .and_then(|value| value.split_once('#'))
    }

    /// Teams that receive client configuration and announcements.
    ///
    /// This is the configured team list plus the fixed channel's team.
    pub fn client_config_teams(&self) -> Vec<String> {
        let mut teams = self.teams.clone();
        if let Some((team, _)) = self.chat_target() {
            if !teams.iter().any(|t| t == team) {
                teams.push(team.to_string());
            }
        }
        teams
    }

    /// Whether the team requires multi-approver consent
    pub fn is_gated_team(&self, team: &str) -> bool {
        self.approval.two_man_teams.iter().any(|t| t == team)
    }
}

/// Multi-approver ("two-man") settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalConfig {
    /// Teams requiring approval before they are issued as a principal
    pub two_man_teams: Vec<String>,

    /// Users whose approval counts
    pub approvers: Vec<String>,

    /// Approvals needed before signing
    pub required_approvers: usize,

    /// Seconds a pending approval request stays open
    pub ttl_secs: u64,

    /// Maximum number of approval requests pending at once
    pub max_pending: usize,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            two_man_teams: Vec::new(),
            approvers: Vec::new(),
            required_approvers: 0,
            ttl_secs: DEFAULT_APPROVAL_TTL_SECS,
            max_pending: DEFAULT_MAX_PENDING_APPROVALS,
        }
    }
}

impl ApprovalConfig {
    /// Pending approval lifetime
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Account the authority logs in as
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeybaseConfig {
    /// Home directory for the messaging service client
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_dir: Option<PathBuf>,

    /// Username to log in as
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Paper key for the account
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paperkey: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_target() {
        let mut config = CaConfig::default();
        assert_eq!(config.chat_target(), None);

        config.chat_channel = Some("infra.ssh#general".to_string());
        assert_eq!(config.chat_target(), Some(("infra.ssh", "general")));
    }

    #[test]
    fn test_client_config_teams_includes_chat_team_once() {
        let config = CaConfig {
            teams: vec!["infra.ssh".to_string(), "infra.ssh.prod".to_string()],
            chat_channel: Some("infra.ssh#general".to_string()),
            ..Default::default()
        };
        assert_eq!(config.client_config_teams(), config.teams);

        let config = CaConfig {
            teams: vec!["infra.ssh.prod".to_string()],
            chat_channel: Some("infra.ssh#general".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.client_config_teams(),
            vec!["infra.ssh.prod".to_string(), "infra.ssh".to_string()]
        );
    }

    #[test]
    fn test_defaults() {
        let config = CaConfig::default();
        assert_eq!(config.ca_key_location, PathBuf::from("/mnt/keybase-ca-key"));
        assert_eq!(config.key_expiration, "+1h");
        assert_eq!(config.approval.ttl(), Duration::from_secs(3600));
        assert_eq!(config.approval.max_pending, 256);
    }
}
