//! Wipe-configs command

use std::sync::Arc;

use clap::Args;
use console::style;
use dialoguer::Confirm;
use tracing::info;

use chatca_authority::wipe_all_client_configs;
use chatca_keybase::KeybaseChannel;
use chatca_signing::{AuditAction, AuditLog};

use crate::cli::{keybase_options, Cli};

use super::LOCAL_ACTOR;

/// Delete the client config from every team this identity can read
#[derive(Debug, Args)]
pub struct WipeConfigsCommand {
    /// Skip confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

impl WipeConfigsCommand {
    /// Execute the wipe-configs command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!("executing wipe-configs command");
        let config = cli.load_config()?;

        if !self.yes {
            let proceed = Confirm::new()
                .with_prompt("Delete the chatca client config from every team you can read?")
                .default(false)
                .interact()?;
            if !proceed {
                println!("{}", style("Aborted.").yellow());
                return Ok(());
            }
        }

        let rt = tokio::runtime::Runtime::new()?;
        let teams = rt.block_on(async {
            let channel = Arc::new(KeybaseChannel::connect(&keybase_options(&config)).await?);
            anyhow::Ok(wipe_all_client_configs(channel).await?)
        })?;

        let mut audit = AuditLog::from_location(config.log_location.as_deref(), config.strict_logging)?;
        audit.record(
            LOCAL_ACTOR,
            AuditAction::ClientConfigsDeleted {
                teams: teams.clone(),
            },
        )?;

        if !cli.quiet {
            if teams.is_empty() {
                println!("No client configs found");
            } else {
                println!(
                    "{} Deleted client configs from: {}",
                    style("✓").green().bold(),
                    teams.join(", ")
                );
            }
        }
        Ok(())
    }
}
