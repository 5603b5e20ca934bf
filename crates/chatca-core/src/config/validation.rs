//! Configuration validation

use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::expiration::Expiration;

use super::types::CaConfig;

/// Whether the value is a valid certificate lifetime such as `+1h` or `+30m`
pub fn is_valid_expiration(value: &str) -> bool {
    value.parse::<Expiration>().is_ok()
}

/// Validate configuration
pub fn validate_config(config: &CaConfig) -> Result<()> {
    debug!("validating configuration");
    validate_teams(config)?;
    validate_expiration(config)?;
    validate_chat_channel(config)?;
    validate_approval(config)?;
    validate_logging(config)?;
    validate_account(config)?;
    debug!("configuration validation passed");
    Ok(())
}

fn validate_teams(config: &CaConfig) -> Result<()> {
    if config.teams.is_empty() {
        return Err(ConfigError::MissingField("teams".to_string()).into());
    }

    if let Some(i) = config.teams.iter().position(|t| t.trim().is_empty()) {
        return Err(ConfigError::InvalidValue {
            field: format!("teams[{}]", i),
            message: "team name cannot be empty".to_string(),
        }
        .into());
    }

    Ok(())
}

fn validate_expiration(config: &CaConfig) -> Result<()> {
    if !is_valid_expiration(&config.key_expiration) {
        return Err(ConfigError::InvalidValue {
            field: "key_expiration".to_string(),
            message: format!(
                "'{}' must look like +<number><m|h|d|w>, e.g. +1h",
                config.key_expiration
            ),
        }
        .into());
    }

    Ok(())
}

fn validate_chat_channel(config: &CaConfig) -> Result<()> {
    let Some(value) = config.chat_channel.as_deref() else {
        return Ok(());
    };

    match value.split_once('#') {
        Some((team, channel)) if !team.is_empty() && !channel.is_empty() && !channel.contains('#') => {
            Ok(())
        }
        _ => Err(ConfigError::InvalidValue {
            field: "chat_channel".to_string(),
            message: format!("'{}' must be in the form team#channel", value),
        }
        .into()),
    }
}

fn validate_approval(config: &CaConfig) -> Result<()> {
    let approval = &config.approval;

    for team in &approval.two_man_teams {
        if !config.teams.contains(team) {
            return Err(ConfigError::InvalidValue {
                field: "approval.two_man_teams".to_string(),
                message: format!("'{}' is not one of the configured teams", team),
            }
            .into());
        }
    }

    if approval.two_man_teams.is_empty() {
        return Ok(());
    }

    if approval.approvers.is_empty() {
        return Err(ConfigError::InvalidValue {
            field: "approval.approvers".to_string(),
            message: "gated teams require at least one approver".to_string(),
        }
        .into());
    }

    if approval.required_approvers == 0 || approval.required_approvers > approval.approvers.len() {
        return Err(ConfigError::InvalidValue {
            field: "approval.required_approvers".to_string(),
            message: format!(
                "must be between 1 and the number of approvers ({})",
                approval.approvers.len()
            ),
        }
        .into());
    }

    if approval.max_pending == 0 {
        return Err(ConfigError::InvalidValue {
            field: "approval.max_pending".to_string(),
            message: "must be at least 1".to_string(),
        }
        .into());
    }

    Ok(())
}

fn validate_logging(config: &CaConfig) -> Result<()> {
    if config.strict_logging && config.log_location.is_none() {
        return Err(ConfigError::InvalidValue {
            field: "strict_logging".to_string(),
            message: "strict logging requires log_location to be set".to_string(),
        }
        .into());
    }

    Ok(())
}

fn validate_account(config: &CaConfig) -> Result<()> {
    let account = &config.keybase;
    if account.username.is_some() != account.paperkey.is_some() {
        return Err(ConfigError::InvalidValue {
            field: "keybase".to_string(),
            message: "username and paperkey must be set together".to_string(),
        }
        .into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn base() -> CaConfig {
        CaConfig {
            teams: vec!["infra.ssh".to_string(), "infra.ssh.root".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_minimal_config() {
        assert!(validate_config(&base()).is_ok());
    }

    #[test]
    fn test_no_teams_rejected() {
        assert!(validate_config(&CaConfig::default()).is_err());
    }

    #[test]
    fn test_expiration_format() {
        assert!(is_valid_expiration("+1h"));
        assert!(is_valid_expiration("+30m"));
        assert!(is_valid_expiration("+52w"));
        assert!(!is_valid_expiration("1h"));
        assert!(!is_valid_expiration("+1y"));
        assert!(!is_valid_expiration("+h"));

        let mut config = base();
        config.key_expiration = "1h".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_expiration_accepted_by_validation_also_parses() {
        // Amount does not fit in u64
        let mut config = base();
        config.key_expiration = "+99999999999999999999h".to_string();
        assert!(validate_config(&config).is_err());
        assert!(config.key_expiration.parse::<Expiration>().is_err());

        config.key_expiration = "+8h".to_string();
        assert!(validate_config(&config).is_ok());
        assert_eq!(
            config.key_expiration.parse::<Expiration>().unwrap().to_string(),
            "+8h"
        );
    }

    #[test]
    fn test_chat_channel_format() {
        let mut config = base();
        config.chat_channel = Some("infra.ssh#general".to_string());
        assert!(validate_config(&config).is_ok());

        config.chat_channel = Some("infra.ssh".to_string());
        assert!(validate_config(&config).is_err());

        config.chat_channel = Some("#general".to_string());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_gated_team_must_be_configured() {
        let mut config = base();
        config.approval.two_man_teams = vec!["other.root".to_string()];
        config.approval.approvers = vec!["alice".to_string()];
        config.approval.required_approvers = 1;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_threshold_bounds() {
        let mut config = base();
        config.approval.two_man_teams = vec!["infra.ssh.root".to_string()];
        config.approval.approvers = vec!["alice".to_string(), "bob".to_string()];

        config.approval.required_approvers = 0;
        assert!(validate_config(&config).is_err());

        config.approval.required_approvers = 3;
        assert!(validate_config(&config).is_err());

        config.approval.required_approvers = 2;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_strict_logging_requires_location() {
        let mut config = base();
        config.strict_logging = true;
        assert!(validate_config(&config).is_err());

        config.log_location = Some(PathBuf::from("/var/log/chatca.log"));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_account_fields_set_together() {
        let mut config = base();
        config.keybase.username = Some("cabot".to_string());
        assert!(validate_config(&config).is_err());

        config.keybase.paperkey = Some("paper key words".to_string());
        assert!(validate_config(&config).is_ok());
    }
}
