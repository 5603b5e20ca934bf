//! Per-machine client settings kept in `~/.ssh/kssh.config`

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ClientError, Result};

/// File name of the local settings inside `~/.ssh`
pub const LOCAL_CONFIG_FILE: &str = "kssh.config";

/// Local client defaults.
///
/// The default team is stored next to the default bot so the client can
/// read the bot's config directly instead of scanning every team.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Bot used when `--bot` is not given
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub default_bot: String,

    /// Team holding the default bot's config
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub default_team: String,

    /// SSH user written into the generated ssh config
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub default_user: String,

    /// Chat client binary to use instead of resolving from `PATH`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub keybase_binary: String,
}

impl LocalConfig {
    /// Default bot and its team, when both are set
    pub fn default_bot(&self) -> Option<(&str, &str)> {
        if self.default_bot.is_empty() || self.default_team.is_empty() {
            None
        } else {
            Some((&self.default_bot, &self.default_team))
        }
    }

    /// Default ssh user, if any
    pub fn default_user(&self) -> Option<&str> {
        Some(self.default_user.as_str()).filter(|u| !u.is_empty())
    }

    /// Chat client binary override, if any
    pub fn keybase_binary(&self) -> Option<&str> {
        Some(self.keybase_binary.as_str()).filter(|b| !b.is_empty())
    }

    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Reads and writes [`LocalConfig`] at a fixed location
#[derive(Debug, Clone)]
pub struct LocalConfigStore {
    path: PathBuf,
}

impl LocalConfigStore {
    /// Store at an explicit path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store inside the given `.ssh` directory
    pub fn in_ssh_dir(ssh_dir: &Path) -> Self {
        Self::new(ssh_dir.join(LOCAL_CONFIG_FILE))
    }

    /// Location of the settings file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the settings; a missing file yields defaults
    pub fn load(&self) -> Result<LocalConfig> {
        if !self.path.exists() {
            return Ok(LocalConfig::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(LocalConfig::default());
        }
        serde_json::from_str(&content).map_err(|e| ClientError::LocalConfig {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    /// Save the settings, removing the file once nothing is set
    pub fn save(&self, config: &LocalConfig) -> Result<()> {
        if config.is_empty() {
            if self.path.exists() {
                std::fs::remove_file(&self.path)?;
            }
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec(config)?)?;
        restrict_permissions(&self.path)?;
        debug!(path = %self.path.display(), "saved local client settings");
        Ok(())
    }

    /// Apply `change` to the stored settings and save the result
    pub fn update(&self, change: impl FnOnce(&mut LocalConfig)) -> Result<LocalConfig> {
        let mut config = self.load()?;
        change(&mut config);
        self.save(&config)?;
        Ok(config)
    }

    /// Record a default bot and the team its config lives in
    pub fn set_default_bot(&self, bot: &str, team: &str) -> Result<LocalConfig> {
        self.update(|c| {
            c.default_bot = bot.to_string();
            c.default_team = team.to_string();
        })
    }

    /// Forget the default bot
    pub fn clear_default_bot(&self) -> Result<LocalConfig> {
        self.update(|c| {
            c.default_bot.clear();
            c.default_team.clear();
        })
    }

    /// Record or clear (with an empty string) the default ssh user
    pub fn set_default_user(&self, user: &str) -> Result<LocalConfig> {
        self.update(|c| c.default_user = user.to_string())
    }

    /// Record or clear (with an empty string) the chat client binary
    pub fn set_keybase_binary(&self, binary: &str) -> Result<LocalConfig> {
        self.update(|c| c.keybase_binary = binary.to_string())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_default() {
        let temp = TempDir::new().unwrap();
        let store = LocalConfigStore::in_ssh_dir(temp.path());
        assert_eq!(store.load().unwrap(), LocalConfig::default());
        assert!(store.load().unwrap().default_bot().is_none());
    }

    #[test]
    fn test_set_and_clear_default_bot() {
        let temp = TempDir::new().unwrap();
        let store = LocalConfigStore::in_ssh_dir(temp.path());

        store.set_default_bot("cabot", "infra.ssh").unwrap();
        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"default_bot\":\"cabot\""));
        assert!(raw.contains("\"default_team\":\"infra.ssh\""));
        assert_eq!(store.load().unwrap().default_bot(), Some(("cabot", "infra.ssh")));

        store.clear_default_bot().unwrap();
        assert!(!store.path().exists());
    }

    #[test]
    fn test_clearing_bot_keeps_other_settings() {
        let temp = TempDir::new().unwrap();
        let store = LocalConfigStore::in_ssh_dir(temp.path());
        store.set_default_bot("cabot", "infra.ssh").unwrap();
        store.set_default_user("deploy").unwrap();

        let config = store.clear_default_bot().unwrap();
        assert_eq!(config.default_user(), Some("deploy"));
        assert!(store.path().exists());
    }

    #[test]
    fn test_reads_files_without_optional_fields() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(LOCAL_CONFIG_FILE);
        std::fs::write(&path, r#"{"default_bot":"cabot","default_team":"infra"}"#).unwrap();
        let config = LocalConfigStore::new(&path).load().unwrap();
        assert_eq!(config.default_bot(), Some(("cabot", "infra")));
        assert_eq!(config.default_user(), None);
    }

    #[test]
    fn test_garbage_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(LOCAL_CONFIG_FILE);
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            LocalConfigStore::new(&path).load(),
            Err(ClientError::LocalConfig { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let temp = TempDir::new().unwrap();
        let store = LocalConfigStore::in_ssh_dir(temp.path());
        store.set_default_user("deploy").unwrap();
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
