//! Running `ssh` and `ssh-add` with the signed key

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{ClientError, Result};

/// Prefix of the signed key file name; the bot name is appended
pub const SIGNED_KEY_PREFIX: &str = "keybase-signed-key--";

/// ssh config written when a default user is set
pub const DEFAULT_USER_CONFIG_FILE: &str = "kssh-config";

/// Locations under the user's `.ssh` directory
#[derive(Debug, Clone)]
pub struct SshPaths {
    dir: PathBuf,
}

impl SshPaths {
    /// Use an explicit `.ssh` directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `~/.ssh`
    pub fn from_home() -> Result<Self> {
        let home = dirs::home_dir().ok_or(ClientError::NoHomeDir)?;
        Ok(Self::new(home.join(".ssh")))
    }

    /// The `.ssh` directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the key signed by `bot` is kept
    pub fn signed_key(&self, bot: &str) -> PathBuf {
        self.dir.join(format!("{}{}", SIGNED_KEY_PREFIX, bot))
    }

    /// The generated default-user ssh config
    pub fn default_user_config(&self) -> PathBuf {
        self.dir.join(DEFAULT_USER_CONFIG_FILE)
    }

    /// Create the `.ssh` directory if missing
    pub fn ensure_dir(&self) -> Result<()> {
        if !self.dir.exists() {
            std::fs::create_dir_all(&self.dir)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(&self.dir, std::fs::Permissions::from_mode(0o700))?;
            }
        }
        Ok(())
    }
}

/// Text of the ssh config that sets a default user and key.
///
/// It includes the user's own `config` so their other settings still apply.
pub fn default_user_config(user: &str, key_path: &Path) -> String {
    format!(
        "# chatssh config file to set a default SSH user\n\
         Include config\n\
         Host *\n  User {}\n  IdentityFile {}\n  IdentitiesOnly yes\n",
        user,
        key_path.display()
    )
}

/// Write the default-user ssh config, returning its path
pub fn write_default_user_config(paths: &SshPaths, user: &str, key_path: &Path) -> Result<PathBuf> {
    paths.ensure_dir()?;

    let base_config = paths.dir().join("config");
    if !base_config.exists() {
        std::fs::write(&base_config, "")?;
    }

    let path = paths.default_user_config();
    std::fs::write(&path, default_user_config(user, key_path))?;
    debug!(path = %path.display(), user, "wrote default user ssh config");
    Ok(path)
}

/// Arguments passed to `ssh` ahead of the user's own
pub fn ssh_arguments(key_path: &Path, config_file: Option<&Path>, extra: &[String]) -> Vec<String> {
    if config_file.is_some() && conflicts_with_config_file(extra) {
        warn!(
            "You passed -F, which chatssh also uses for the default SSH user. \
             Drop -F or run `chatssh --clear-default-user`."
        );
    }

    let mut args = vec![
        "-i".to_string(),
        key_path.display().to_string(),
        "-o".to_string(),
        "IdentitiesOnly=yes".to_string(),
    ];
    if let Some(config_file) = config_file {
        args.push("-F".to_string());
        args.push(config_file.display().to_string());
    }
    args.extend(extra.iter().cloned());
    args
}

/// Whether the user's own arguments clash with the generated `-F`
pub fn conflicts_with_config_file(extra: &[String]) -> bool {
    extra.iter().any(|a| a == "-F")
}

/// Add the key to the running ssh-agent
pub async fn add_key_to_agent(key_path: &Path) -> Result<()> {
    which::which("ssh-add").map_err(|_| ClientError::ToolNotFound {
        tool: "ssh-add".to_string(),
    })?;

    let output = Command::new("ssh-add")
        .arg(key_path)
        .stdin(Stdio::null())
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let detail = if stderr.trim().is_empty() { stdout } else { stderr };
        return Err(ClientError::ToolFailed {
            tool: "ssh-add".to_string(),
            reason: format!("is the ssh-agent running? {}", detail.trim()),
        });
    }
    Ok(())
}

/// Run `ssh` with inherited stdio and wait for it
pub async fn run_ssh(args: &[String]) -> Result<ExitStatus> {
    which::which("ssh").map_err(|_| ClientError::ToolNotFound {
        tool: "ssh".to_string(),
    })?;

    debug!(?args, "running ssh");
    let status = Command::new("ssh")
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await?;
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_signed_key_path_includes_bot() {
        let paths = SshPaths::new("/home/alice/.ssh");
        assert_eq!(
            paths.signed_key("cabot"),
            PathBuf::from("/home/alice/.ssh/keybase-signed-key--cabot")
        );
        assert_eq!(
            paths.signed_key(""),
            PathBuf::from("/home/alice/.ssh/keybase-signed-key--")
        );
    }

    #[test]
    fn test_ssh_arguments() {
        let key = PathBuf::from("/k");
        let extra = vec!["host".to_string(), "uptime".to_string()];
        assert_eq!(
            ssh_arguments(&key, None, &extra),
            vec!["-i", "/k", "-o", "IdentitiesOnly=yes", "host", "uptime"]
        );
        assert_eq!(
            ssh_arguments(&key, Some(Path::new("/c")), &extra),
            vec!["-i", "/k", "-o", "IdentitiesOnly=yes", "-F", "/c", "host", "uptime"]
        );
    }

    #[test]
    fn test_write_default_user_config() {
        let temp = TempDir::new().unwrap();
        let paths = SshPaths::new(temp.path().join(".ssh"));
        let key = paths.signed_key("cabot");

        let path = write_default_user_config(&paths, "deploy", &key).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("Include config\n"));
        assert!(content.contains("  User deploy\n"));
        assert!(content.contains(&format!("  IdentityFile {}\n", key.display())));
        assert!(content.contains("  IdentitiesOnly yes\n"));
        assert!(paths.dir().join("config").exists());
    }

    #[test]
    fn test_config_file_conflict() {
        assert!(conflicts_with_config_file(&["-F".to_string(), "x".to_string()]));
        assert!(!conflicts_with_config_file(&["host".to_string()]));
    }
}
