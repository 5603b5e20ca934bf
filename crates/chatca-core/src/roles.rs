//! Team membership roles as reported by the messaging service

use serde::{Deserialize, Serialize};

/// Role of a user within a team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamRole {
    /// Team owner
    Owner,
    /// Team admin
    Admin,
    /// Can read and write team data
    Writer,
    /// Read-only member
    Reader,
    /// Bot account with full read access
    Bot,
    /// Bot account restricted to specific conversations
    RestrictedBot,
    /// Not an explicit member (e.g. implicit admin of a parent team)
    None,
}

impl TeamRole {
    /// Get the display name for this role
    pub fn display_name(&self) -> &'static str {
        match self {
            TeamRole::Owner => "Owner",
            TeamRole::Admin => "Admin",
            TeamRole::Writer => "Writer",
            TeamRole::Reader => "Reader",
            TeamRole::Bot => "Bot",
            TeamRole::RestrictedBot => "Restricted Bot",
            TeamRole::None => "None",
        }
    }

    /// Whether membership with this role makes the team usable as a principal.
    ///
    /// Only writer and above qualify. Readers, bots and implicit admins
    /// without explicit membership never do.
    pub fn grants_principal(&self) -> bool {
        matches!(self, TeamRole::Owner | TeamRole::Admin | TeamRole::Writer)
    }

    /// Whether this role can read team data such as the key-value store
    pub fn can_read_team(&self) -> bool {
        matches!(
            self,
            TeamRole::Owner | TeamRole::Admin | TeamRole::Writer | TeamRole::Reader | TeamRole::Bot
        )
    }

    /// Map the numeric role used by the messaging service's JSON API
    pub fn from_code(code: i64) -> Self {
        match code {
            4 => TeamRole::Owner,
            3 => TeamRole::Admin,
            2 => TeamRole::Writer,
            1 => TeamRole::Reader,
            5 => TeamRole::Bot,
            6 => TeamRole::RestrictedBot,
            _ => TeamRole::None,
        }
    }
}

impl std::fmt::Display for TeamRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for TeamRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "owner" | "owners" => Ok(TeamRole::Owner),
            "admin" | "admins" => Ok(TeamRole::Admin),
            "writer" | "writers" => Ok(TeamRole::Writer),
            "reader" | "readers" => Ok(TeamRole::Reader),
            "bot" | "bots" => Ok(TeamRole::Bot),
            "restricted_bot" | "restrictedbot" | "restricted_bots" => Ok(TeamRole::RestrictedBot),
            "none" => Ok(TeamRole::None),
            _ => Err(format!(
                "Unknown role: {}. Valid roles: owner, admin, writer, reader, bot, restricted_bot, none",
                s
            )),
        }
    }
}

/// A (user, role) pair from a team membership listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    /// Username of the member
    pub username: String,
    /// Role within the team
    pub role: TeamRole,
}

impl TeamMember {
    /// Create a new team member entry
    pub fn new(username: impl Into<String>, role: TeamRole) -> Self {
        Self {
            username: username.into(),
            role,
        }
    }
}

/// A (team, role) pair from a user's membership listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMembership {
    /// Fully qualified team name
    pub team: String,
    /// The user's role within the team
    pub role: TeamRole,
}

impl TeamMembership {
    /// Create a new membership entry
    pub fn new(team: impl Into<String>, role: TeamRole) -> Self {
        Self {
            team: team.into(),
            role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!("owner".parse::<TeamRole>().unwrap(), TeamRole::Owner);
        assert_eq!("ADMINS".parse::<TeamRole>().unwrap(), TeamRole::Admin);
        assert_eq!("writer".parse::<TeamRole>().unwrap(), TeamRole::Writer);
        assert_eq!("restricted_bot".parse::<TeamRole>().unwrap(), TeamRole::RestrictedBot);
        assert!("superuser".parse::<TeamRole>().is_err());
    }

    #[test]
    fn test_writer_and_above_grant_principal() {
        assert!(TeamRole::Owner.grants_principal());
        assert!(TeamRole::Admin.grants_principal());
        assert!(TeamRole::Writer.grants_principal());
    }

    #[test]
    fn test_reader_bot_and_implicit_admin_do_not_grant_principal() {
        assert!(!TeamRole::Reader.grants_principal());
        assert!(!TeamRole::Bot.grants_principal());
        assert!(!TeamRole::RestrictedBot.grants_principal());
        assert!(!TeamRole::None.grants_principal());
    }

    #[test]
    fn test_role_codes() {
        assert_eq!(TeamRole::from_code(4), TeamRole::Owner);
        assert_eq!(TeamRole::from_code(2), TeamRole::Writer);
        assert_eq!(TeamRole::from_code(0), TeamRole::None);
        assert!(TeamRole::Reader.can_read_team());
        assert!(!TeamRole::RestrictedBot.can_read_team());
    }
}
