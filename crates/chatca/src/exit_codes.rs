//! Exit codes for the CLI

#![allow(dead_code)]

/// Success
pub const SUCCESS: i32 = 0;

/// General error
pub const ERROR: i32 = 1;

/// Configuration error
pub const CONFIG_ERROR: i32 = 2;

/// Messaging channel error
pub const CHANNEL_ERROR: i32 = 3;

/// Signing or key handling error
pub const SIGNING_ERROR: i32 = 4;

/// User cancelled
pub const CANCELLED: i32 = 130;

/// Pick the exit code for a failed command
pub fn for_error(error: &anyhow::Error) -> i32 {
    use chatca_authority::AuthorityError;
    use chatca_client::ClientError;
    use chatca_core::{ChannelError, ChatCaError, ConfigError};
    use chatca_signing::SigningError;

    for cause in error.chain() {
        if cause.is::<ConfigError>() || matches!(cause.downcast_ref::<ChatCaError>(), Some(ChatCaError::Config(_))) {
            return CONFIG_ERROR;
        }
        if cause.is::<ChannelError>() {
            return CHANNEL_ERROR;
        }
        if cause.is::<SigningError>() {
            return SIGNING_ERROR;
        }
        match cause.downcast_ref::<AuthorityError>() {
            Some(AuthorityError::Config(_)) => return CONFIG_ERROR,
            Some(AuthorityError::Subscription(_) | AuthorityError::Channel(_)) => return CHANNEL_ERROR,
            Some(AuthorityError::Signing(_)) => return SIGNING_ERROR,
            _ => {}
        }
        match cause.downcast_ref::<ClientError>() {
            Some(ClientError::Channel(_)) => return CHANNEL_ERROR,
            Some(ClientError::Signing(_)) => return SIGNING_ERROR,
            _ => {}
        }
        if let Some(dialoguer::Error::IO(e)) = cause.downcast_ref::<dialoguer::Error>() {
            if e.kind() == std::io::ErrorKind::Interrupted {
                return CANCELLED;
            }
        }
    }
    ERROR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_map_to_config_code() {
        let err = anyhow::Error::new(chatca_core::ConfigError::MissingField("teams".to_string()));
        assert_eq!(for_error(&err), CONFIG_ERROR);
        let err = anyhow::Error::new(chatca_core::ChannelError::Read("closed".to_string()))
            .context("service stopped");
        assert_eq!(for_error(&err), CHANNEL_ERROR);
        assert_eq!(for_error(&anyhow::anyhow!("boom")), ERROR);
    }
}
