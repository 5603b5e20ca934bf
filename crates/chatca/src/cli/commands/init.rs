//! Init command

use std::path::PathBuf;

use clap::Args;
use console::style;
use dialoguer::Confirm;
use tracing::info;

use chatca_core::config::{DEFAULT_CONFIG_TEMPLATE, DEFAULT_CONFIG_TOML};

use crate::cli::Cli;

/// Write a starter chatca.toml
#[derive(Debug, Args)]
pub struct InitCommand {
    /// Force overwrite existing configuration
    #[arg(short, long)]
    pub force: bool,

    /// Never prompt; fail if the file exists and --force is not given
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Output file path
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl InitCommand {
    /// Execute the init command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(force = self.force, yes = self.yes, "executing init command");
        let config_path = match &self.output {
            Some(path) => path.clone(),
            None => std::env::current_dir()?.join(DEFAULT_CONFIG_TOML),
        };

        if config_path.exists() && !self.force {
            if self.yes {
                anyhow::bail!(
                    "Configuration file already exists at {}. Use --force to overwrite.",
                    config_path.display()
                );
            }

            let overwrite = Confirm::new()
                .with_prompt(format!(
                    "Configuration file already exists at {}. Overwrite?",
                    config_path.display()
                ))
                .default(false)
                .interact()?;

            if !overwrite {
                println!("{}", style("Aborted.").yellow());
                return Ok(());
            }
        }

        std::fs::write(&config_path, DEFAULT_CONFIG_TEMPLATE)?;

        if !cli.quiet {
            println!(
                "{} Created configuration at {}",
                style("✓").green().bold(),
                style(config_path.display()).cyan()
            );
            println!();
            println!("Next steps:");
            println!("  1. List the teams allowed to request certificates in {}", config_path.display());
            println!("  2. Run {} to create the CA key", style("chatca generate").cyan());
            println!("  3. Run {} to start serving certificates", style("chatca service").cyan());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use crate::cli::Cli;

    fn init_cli(path: &std::path::Path, extra: &[&str]) -> Cli {
        let path = path.to_string_lossy().to_string();
        let mut argv = vec!["chatca", "-q", "init", "-y", "-o", path.as_str()];
        argv.extend_from_slice(extra);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_init_writes_parseable_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chatca.toml");

        init_cli(&path, &[]).execute().unwrap();

        let config = chatca_core::config::load_config(&path).unwrap();
        assert_eq!(config.key_expiration, "+1h");
        assert!(config.teams.is_empty());
    }

    #[test]
    fn test_init_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chatca.toml");
        std::fs::write(&path, "teams = [\"infra.ssh\"]\n").unwrap();

        assert!(init_cli(&path, &[]).execute().is_err());
        assert!(std::fs::read_to_string(&path).unwrap().contains("infra.ssh"));

        init_cli(&path, &["--force"]).execute().unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("chatca configuration"));
    }
}
