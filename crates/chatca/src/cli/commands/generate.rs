//! Generate command

use clap::Args;
use console::style;
use tracing::info;

use chatca_signing::{AuditAction, AuditLog, SshKeygen};

use crate::cli::Cli;

use super::LOCAL_ACTOR;

/// Generate the CA key pair at the configured location
#[derive(Debug, Args)]
pub struct GenerateCommand {
    /// Replace an existing CA key
    #[arg(long, env = "FORCE_WRITE")]
    pub overwrite_existing_key: bool,
}

impl GenerateCommand {
    /// Execute the generate command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let config = cli.load_config()?;
        let path = config.ca_key_location.clone();
        info!(path = %path.display(), overwrite = self.overwrite_existing_key, "executing generate command");

        let rt = tokio::runtime::Runtime::new()?;
        let public_key = rt
            .block_on(SshKeygen::new().generate_key(&path, self.overwrite_existing_key))
            .map_err(|e| match e {
                chatca_signing::SigningError::KeyExists(_) => anyhow::Error::new(e)
                    .context("pass --overwrite-existing-key or set FORCE_WRITE=true if you are sure"),
                other => anyhow::Error::new(other).context("failed to generate a new CA key"),
            })?;

        let mut audit = AuditLog::from_location(config.log_location.as_deref(), config.strict_logging)?;
        audit.record(
            LOCAL_ACTOR,
            AuditAction::KeyGenerated {
                path: path.display().to_string(),
            },
        )?;

        if !cli.quiet {
            println!(
                "{} Generated CA key at {}",
                style("✓").green().bold(),
                style(path.display()).cyan()
            );
            println!();
            println!("Add this public key to TrustedUserCAKeys on your servers:");
        }
        println!("{}", public_key);

        Ok(())
    }
}
