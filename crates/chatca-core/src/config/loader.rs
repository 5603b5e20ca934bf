//! Configuration loading

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ConfigError, Result};

use super::defaults::config_file_names;
use super::types::CaConfig;
use super::validation::validate_config;

/// Load configuration from a file without validating it
pub fn load_config(path: &Path) -> Result<CaConfig> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()).into());
    }

    let format = if path.extension().is_some_and(|e| e == "toml") {
        "TOML"
    } else {
        "YAML"
    };
    info!(path = %path.display(), format, "loading config");

    let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

    let config: CaConfig = if format == "TOML" {
        toml::from_str(&content).map_err(ConfigError::TomlError)?
    } else {
        serde_yaml::from_str(&content).map_err(ConfigError::YamlError)?
    };

    debug!(path = %path.display(), "config loaded");
    Ok(config)
}

/// Find configuration file in directory or parent directories.
///
/// The first match wins. Parents are walked until the filesystem root.
pub fn find_config(start_dir: &Path) -> Option<PathBuf> {
    debug!(start_dir = %start_dir.display(), "searching for config file");
    let mut current = start_dir.to_path_buf();

    loop {
        for name in config_file_names() {
            let config_path = current.join(name);
            if config_path.exists() {
                info!(path = %config_path.display(), "found config file");
                return Some(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    debug!("no config file found");
    None
}

/// Build the effective configuration.
///
/// Starts from `explicit` if given, otherwise from the first config file found
/// from `dir` upward, otherwise from defaults. Environment variables are then
/// applied on top and the result is validated.
pub fn resolve_config(explicit: Option<&Path>, dir: &Path) -> Result<(CaConfig, Option<PathBuf>)> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => find_config(dir),
    };

    let mut config = match &path {
        Some(path) => load_config(path)?,
        None => {
            info!("no config file found, using defaults and environment");
            CaConfig::default()
        }
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config)?;
    Ok((config, path))
}

/// Apply environment overrides using the given lookup
pub fn apply_env_overrides<F>(config: &mut CaConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

    if let Some(value) = get("CA_KEY_LOCATION") {
        config.ca_key_location = PathBuf::from(value);
    }
    if let Some(value) = get("KEY_EXPIRATION") {
        config.key_expiration = value.trim().to_string();
    }
    if let Some(value) = get("TEAMS") {
        config.teams = split_list(&value);
    }
    if let Some(value) = get("CHAT_CHANNEL") {
        config.chat_channel = Some(value.trim().to_string());
    }
    if let Some(value) = get("LOG_LOCATION") {
        config.log_location = Some(PathBuf::from(value));
    }
    if let Some(value) = get("STRICT_LOGGING") {
        config.strict_logging = parse_bool("STRICT_LOGGING", &value)?;
    }
    if let Some(value) = get("ANNOUNCEMENT") {
        config.announcement = Some(value);
    }
    if let Some(value) = get("TWO_MAN_TEAMS") {
        config.approval.two_man_teams = split_list(&value);
    }
    if let Some(value) = get("APPROVERS") {
        config.approval.approvers = split_list(&value);
    }
    if let Some(value) = get("NUM_REQUIRED_APPROVERS") {
        config.approval.required_approvers =
            value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                field: "NUM_REQUIRED_APPROVERS".to_string(),
                message: format!("'{}' is not a number", value),
            })?;
    }
    if let Some(value) = get("KEYBASE_HOME_DIR") {
        config.keybase.home_dir = Some(PathBuf::from(value));
    }
    if let Some(value) = get("KEYBASE_USERNAME") {
        config.keybase.username = Some(value.trim().to_string());
    }
    if let Some(value) = get("KEYBASE_PAPERKEY") {
        config.keybase.paperkey = Some(value.trim().to_string());
    }

    Ok(())
}

/// Split a comma separated list, dropping blanks
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(field: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            message: format!("'{}' is not a boolean", value),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_find_config_walks_parents() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("chatca.toml");
        std::fs::write(&config_path, "teams = [\"infra.ssh\"]").unwrap();
        let nested = temp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_config(&nested), Some(config_path));
    }

    #[test]
    fn test_find_config_prefers_toml_over_yaml() {
        let temp = TempDir::new().unwrap();
        let toml_path = temp.path().join("chatca.toml");
        std::fs::write(&toml_path, "teams = [\"infra.ssh\"]").unwrap();
        std::fs::write(temp.path().join("chatca.yaml"), "teams: [infra.ssh]").unwrap();

        assert_eq!(find_config(temp.path()).unwrap(), toml_path);
    }

    #[test]
    fn test_load_config_toml() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("chatca.toml");
        std::fs::write(
            &config_path,
            "teams = [\"infra.ssh\", \"infra.ssh.root\"]\nkey_expiration = \"+30m\"\n\n[approval]\ntwo_man_teams = [\"infra.ssh.root\"]\napprovers = [\"alice\", \"bob\"]\nrequired_approvers = 2\n",
        )
        .unwrap();

        let config = load_config(&config_path).unwrap();
        assert_eq!(config.teams.len(), 2);
        assert_eq!(config.key_expiration, "+30m");
        assert_eq!(config.approval.required_approvers, 2);
        assert_eq!(config.approval.max_pending, 256);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_load_config_yaml() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("chatca.yaml");
        std::fs::write(
            &config_path,
            "teams:\n  - infra.ssh\nchat_channel: \"infra.ssh#general\"\n",
        )
        .unwrap();

        let config = load_config(&config_path).unwrap();
        assert_eq!(config.chat_target(), Some(("infra.ssh", "general")));
    }

    #[test]
    fn test_load_missing_file() {
        let temp = TempDir::new().unwrap();
        assert!(load_config(&temp.path().join("nope.toml")).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = CaConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("TEAMS", "infra.ssh, infra.ssh.root ,"),
                ("CA_KEY_LOCATION", "/keys/ca"),
                ("KEY_EXPIRATION", "+2h"),
                ("TWO_MAN_TEAMS", "infra.ssh.root"),
                ("APPROVERS", "alice,bob"),
                ("NUM_REQUIRED_APPROVERS", "1"),
                ("STRICT_LOGGING", "true"),
                ("LOG_LOCATION", "/var/log/ca.log"),
            ]),
        )
        .unwrap();

        assert_eq!(config.teams, vec!["infra.ssh", "infra.ssh.root"]);
        assert_eq!(config.ca_key_location, PathBuf::from("/keys/ca"));
        assert_eq!(config.key_expiration, "+2h");
        assert_eq!(config.approval.approvers, vec!["alice", "bob"]);
        assert_eq!(config.approval.required_approvers, 1);
        assert!(config.strict_logging);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_env_blank_values_are_ignored() {
        let mut config = CaConfig::default();
        apply_env_overrides(&mut config, env(&[("CA_KEY_LOCATION", "  ")])).unwrap();
        assert_eq!(config, CaConfig::default());
    }

    #[test]
    fn test_env_bad_number() {
        let mut config = CaConfig::default();
        let result = apply_env_overrides(&mut config, env(&[("NUM_REQUIRED_APPROVERS", "two")]));
        assert!(result.is_err());
    }
}
