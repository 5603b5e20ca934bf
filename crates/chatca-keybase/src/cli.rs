//! Invoking the `keybase` binary

use std::path::PathBuf;
use std::process::Stdio;

use chatca_core::error::ChannelError;
use serde_json::Value;
use tokio::process::{Child, Command};
use tracing::debug;

/// How to run the `keybase` binary
#[derive(Debug, Clone, Default)]
pub struct KeybaseOptions {
    /// Binary to run; `keybase` from `PATH` when unset
    pub binary: Option<String>,

    /// Alternate Keybase home directory
    pub home_dir: Option<PathBuf>,

    /// Username and paper key for a oneshot login
    pub oneshot: Option<(String, String)>,
}

/// Runs `keybase` subcommands
#[derive(Debug, Clone)]
pub struct KeybaseCli {
    binary: String,
    home_dir: Option<PathBuf>,
}

impl KeybaseCli {
    /// Create from options
    pub fn new(options: &KeybaseOptions) -> Self {
        Self {
            binary: options
                .binary
                .clone()
                .unwrap_or_else(|| "keybase".to_string()),
            home_dir: options.home_dir.clone(),
        }
    }

    /// Check whether the binary can be found
    pub fn is_available(&self) -> bool {
        which::which(&self.binary).is_ok()
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new(&self.binary);
        if let Some(home) = &self.home_dir {
            command.arg("--home").arg(home);
        }
        command.args(args);
        command
    }

    /// Run a subcommand and return stdout
    pub async fn run(&self, args: &[&str]) -> Result<String, ChannelError> {
        self.run_with_env(args, &[]).await
    }

    /// Run a subcommand with extra environment and return stdout
    pub async fn run_with_env(&self, args: &[&str], env: &[(&str, &str)]) -> Result<String, ChannelError> {
        debug!("Running keybase with args: {:?}", args);

        let mut command = self.command(args);
        for (key, value) in env {
            command.env(key, value);
        }
        let output = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| ChannelError::Backend(format!("failed to run {}: {}", self.binary, e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            // API errors come back as JSON on stdout with a failing status
            if stdout.trim_start().starts_with('{') {
                return Ok(stdout);
            }
            return Err(ChannelError::Backend(if stderr.is_empty() {
                stdout
            } else {
                stderr.trim().to_string()
            }));
        }

        Ok(stdout)
    }

    /// Send a JSON request to `keybase <api> api` and return the raw reply
    pub async fn api(&self, api: &str, request: &Value) -> Result<String, ChannelError> {
        let body = request.to_string();
        self.run(&[api, "api", "-m", &body]).await
    }

    /// Start `keybase chat api-listen` with stdout piped
    pub fn spawn_listener(&self) -> Result<Child, ChannelError> {
        self.command(&["chat", "api-listen"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ChannelError::Subscribe(format!("failed to start {} chat api-listen: {}", self.binary, e)))
    }
}
