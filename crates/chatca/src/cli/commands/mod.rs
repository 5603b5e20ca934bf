//! CLI commands

mod backup;
mod generate;
mod init;
mod service;
mod wipe_configs;

pub use backup::BackupCommand;
pub use generate::GenerateCommand;
pub use init::InitCommand;
pub use service::ServiceCommand;
pub use wipe_configs::WipeConfigsCommand;

/// Actor recorded in the audit log for local administrative commands
pub(crate) const LOCAL_ACTOR: &str = "local-admin";
