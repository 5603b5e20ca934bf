//! Backup command

use clap::Args;
use console::style;
use dialoguer::Input;
use tracing::info;

use chatca_signing::{AuditAction, AuditLog};

use crate::cli::Cli;

use super::LOCAL_ACTOR;

/// Print the CA private key so it can be stored offline
#[derive(Debug, Args)]
pub struct BackupCommand {}

impl BackupCommand {
    /// Execute the backup command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!("executing backup command");

        println!(
            "{} Anyone holding the CA private key can log in to every server that trusts this authority.",
            style("!").yellow().bold()
        );
        let response: String = Input::new()
            .with_prompt("Type \"yes\" to export the key")
            .allow_empty(true)
            .interact_text()?;
        if !confirmed(&response) {
            anyhow::bail!("Did not get confirmation of key export, aborting");
        }

        let config = cli.load_config()?;
        let key = std::fs::read_to_string(&config.ca_key_location).map_err(|e| {
            anyhow::anyhow!(
                "Failed to load the CA key from {}: {}",
                config.ca_key_location.display(),
                e
            )
        })?;

        let mut audit = AuditLog::from_location(config.log_location.as_deref(), config.strict_logging)?;
        audit.record(
            LOCAL_ACTOR,
            AuditAction::KeyExported {
                path: config.ca_key_location.display().to_string(),
            },
        )?;

        println!();
        println!("Keep this key somewhere very safe, ideally as a physical copy in a secure place.");
        println!();
        println!("{}", key.trim_end());

        Ok(())
    }
}

fn confirmed(response: &str) -> bool {
    response.trim() == "yes"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_literal_yes_confirms() {
        assert!(confirmed("yes"));
        assert!(confirmed(" yes\n"));
        assert!(!confirmed("y"));
        assert!(!confirmed("YES please"));
        assert!(!confirmed(""));
    }
}
