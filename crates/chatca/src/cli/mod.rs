//! CLI definition and command handling

pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;

use chatca_core::config::{resolve_config, CaConfig};
use chatca_keybase::KeybaseOptions;

use commands::{
    BackupCommand, GenerateCommand, InitCommand, ServiceCommand, WipeConfigsCommand,
};

/// chatca - SSH certificate authority served over team chat
#[derive(Debug, Parser)]
#[command(name = "chatca")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (default: chatca.toml or chatca.yaml found from the working directory up)
    #[arg(short, long, global = true, env = "CHATCA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Working directory
    #[arg(short = 'C', long, global = true)]
    pub directory: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Write a starter chatca.toml
    Init(InitCommand),

    /// Run the certificate authority
    Service(ServiceCommand),

    /// Generate the CA key pair
    Generate(GenerateCommand),

    /// Print the CA private key for offline backup
    Backup(BackupCommand),

    /// Delete every client config this identity can see
    WipeConfigs(WipeConfigsCommand),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> anyhow::Result<()> {
        if let Some(dir) = &self.directory {
            std::env::set_current_dir(dir)?;
        }

        match self.command {
            Commands::Init(ref cmd) => cmd.execute(&self),
            Commands::Service(ref cmd) => cmd.execute(&self),
            Commands::Generate(ref cmd) => cmd.execute(&self),
            Commands::Backup(ref cmd) => cmd.execute(&self),
            Commands::WipeConfigs(ref cmd) => cmd.execute(&self),
        }
    }

    /// Load, override and validate the authority configuration
    pub fn load_config(&self) -> anyhow::Result<CaConfig> {
        let cwd = std::env::current_dir()?;
        let (config, path) = resolve_config(self.config.as_deref(), &cwd)?;
        match path {
            Some(path) => debug!(path = %path.display(), "loaded configuration"),
            None => debug!("using configuration from environment"),
        }
        Ok(config)
    }
}

/// Keybase connection options for a configuration
pub fn keybase_options(config: &CaConfig) -> KeybaseOptions {
    let oneshot = match (&config.keybase.username, &config.keybase.paperkey) {
        (Some(username), Some(paperkey)) => Some((username.clone(), paperkey.clone())),
        _ => None,
    };
    KeybaseOptions {
        binary: None,
        home_dir: config.keybase.home_dir.clone(),
        oneshot,
    }
}
