//! chatca authority - serves SSH certificates over team chat
//!
//! The [`Authority`] reads every message its identity can see, keeps to the
//! configured teams, answers the client handshake, resolves principals from
//! team membership, collects approvals for gated principals and replies with
//! signed certificates.

pub mod announcement;
pub mod approvals;
pub mod client_config;
pub mod engine;
pub mod error;
pub mod principals;

pub use announcement::{build_announcement, AnnouncementValues};
pub use approvals::{ApprovalCoordinator, ApprovalOutcome, OutstandingApproval, ReplyAddress};
pub use client_config::{
    client_configs, delete_client_configs, publish_client_configs, wipe_all_client_configs,
};
pub use engine::{is_configured_team, Authority};
pub use error::{AuthorityError, Result};
pub use principals::{resolve_principals, TeamPrincipalConfig};
