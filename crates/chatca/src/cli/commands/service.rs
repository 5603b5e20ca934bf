//! Service command

use std::sync::Arc;

use clap::Args;
use console::style;
use tracing::{info, warn};

use chatca_authority::Authority;
use chatca_keybase::KeybaseChannel;
use chatca_signing::{AuditLog, CertificateSigner, SigningError, SshKeygenSigner};

use crate::cli::{keybase_options, Cli};

/// Run the certificate authority in the foreground
#[derive(Debug, Args)]
pub struct ServiceCommand {
    /// Leave the published client configs in place on exit
    #[arg(long)]
    pub keep_configs: bool,
}

impl ServiceCommand {
    /// Execute the service command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let config = cli.load_config()?;
        info!(teams = ?config.teams, "executing service command");

        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(self.run(cli, config))
    }

    async fn run(&self, cli: &Cli, config: chatca_core::CaConfig) -> anyhow::Result<()> {
        let signer = SshKeygenSigner::new(&config.ca_key_location);
        if !signer.is_available() {
            return Err(SigningError::ToolNotFound {
                tool: "ssh-keygen".to_string(),
                hint: "Install OpenSSH (ssh-keygen) and make sure it is on PATH".to_string(),
            }
            .into());
        }
        if !config.ca_key_location.exists() {
            return Err(anyhow::Error::new(SigningError::CaKeyNotFound(
                config.ca_key_location.clone(),
            ))
            .context("run `chatca generate` to create the CA key"));
        }

        let audit = AuditLog::from_location(config.log_location.as_deref(), config.strict_logging)?;
        let channel = Arc::new(KeybaseChannel::connect(&keybase_options(&config)).await?);

        if !cli.quiet {
            println!(
                "{} Serving certificates as {} for {}",
                style("→").blue(),
                style(chatca_core::MessagingChannel::username(channel.as_ref())).cyan(),
                config.teams.join(", ")
            );
        }

        let mut authority = Authority::new(channel, signer, config, audit)?;
        let outcome = tokio::select! {
            result = authority.run() => result.map_err(anyhow::Error::from),
            signal = shutdown_signal() => {
                info!(signal, "shutting down");
                Ok(())
            }
        };

        if self.keep_configs {
            return outcome;
        }

        match authority.shutdown().await {
            Ok(teams) => {
                info!(teams = ?teams, "deleted client configs");
                if !cli.quiet {
                    println!(
                        "{} Removed client configs from {} team(s)",
                        style("✓").green().bold(),
                        teams.len()
                    );
                }
            }
            Err(e) => {
                // The loop's own error is the more useful one to surface
                if outcome.is_err() {
                    warn!(error = %e, "failed to delete client configs");
                } else {
                    return Err(anyhow::Error::from(e).context("failed to delete client configs"));
                }
            }
        }

        outcome.map_err(|e| e.context("certificate authority stopped"))
    }
}

/// Resolve on SIGINT or SIGTERM, returning the signal's name
async fn shutdown_signal() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => tokio::select! {
                _ = tokio::signal::ctrl_c() => "SIGINT",
                _ = sigterm.recv() => "SIGTERM",
            },
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                "SIGINT"
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        "ctrl-c"
    }
}
