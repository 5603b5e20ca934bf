//! chatca client - obtains SSH certificates from a chatca authority
//!
//! The client discovers the authority through the configs it publishes in
//! team key-value stores, performs the ack handshake over chat, stores the
//! signed key under `~/.ssh` and hands it to `ssh`.

pub mod discovery;
pub mod error;
pub mod local_config;
pub mod provision;
pub mod requester;
pub mod ssh;

pub use discovery::{find_config_for_bot, load_configs, load_team_config, select_config};
pub use error::{ClientError, Result};
pub use local_config::{LocalConfig, LocalConfigStore};
pub use provision::{has_usable_certificate, provision_new_key};
pub use requester::{Requester, GATED_TIMEOUT, UNGATED_TIMEOUT};
pub use ssh::SshPaths;
