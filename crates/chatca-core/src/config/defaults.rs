//! Default configuration values

use super::types::CaConfig;

/// Default configuration file name (TOML)
pub const DEFAULT_CONFIG_TOML: &str = "chatca.toml";

/// Default configuration file name (YAML)
pub const DEFAULT_CONFIG_YAML: &str = "chatca.yaml";

/// Alternative configuration file name
pub const ALT_CONFIG_FILE: &str = ".chatca.toml";

/// Default location of the CA private key
pub const DEFAULT_CA_KEY_LOCATION: &str = "/mnt/keybase-ca-key";

/// Default certificate lifetime
pub const DEFAULT_KEY_EXPIRATION: &str = "+1h";

/// Default lifetime of a pending approval request, in seconds
pub const DEFAULT_APPROVAL_TTL_SECS: u64 = 60 * 60;

/// Default cap on concurrently pending approval requests
pub const DEFAULT_MAX_PENDING_APPROVALS: usize = 256;

/// Get list of config file names to search for
pub fn config_file_names() -> Vec<&'static str> {
    vec![DEFAULT_CONFIG_TOML, DEFAULT_CONFIG_YAML, ALT_CONFIG_FILE]
}

/// Generate a commented configuration template
pub fn default_config_toml() -> String {
    let config = CaConfig::default();
    toml::to_string_pretty(&config).unwrap_or_else(|_| DEFAULT_CONFIG_TEMPLATE.to_string())
}

/// Default configuration template
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# chatca configuration
ca_key_location = "/mnt/keybase-ca-key"
key_expiration = "+1h"
teams = []
strict_logging = false

[approval]
two_man_teams = []
approvers = []
required_approvers = 0
ttl_secs = 3600
max_pending = 256

[keybase]
"#;
