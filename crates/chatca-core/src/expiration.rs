//! Certificate lifetimes such as `+1h`

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

static EXPIRATION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+(?P<amount>[0-9]+)(?P<unit>[mhdw])$").expect("Invalid regex"));

/// Unit of an expiration string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpirationUnit {
    Minutes,
    Hours,
    Days,
    Weeks,
}

impl ExpirationUnit {
    fn suffix(self) -> char {
        match self {
            ExpirationUnit::Minutes => 'm',
            ExpirationUnit::Hours => 'h',
            ExpirationUnit::Days => 'd',
            ExpirationUnit::Weeks => 'w',
        }
    }

    fn seconds(self) -> u64 {
        match self {
            ExpirationUnit::Minutes => 60,
            ExpirationUnit::Hours => 60 * 60,
            ExpirationUnit::Days => 24 * 60 * 60,
            ExpirationUnit::Weeks => 7 * 24 * 60 * 60,
        }
    }
}

/// Relative certificate lifetime starting now, as accepted by `ssh-keygen -V`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expiration {
    pub amount: u64,
    pub unit: ExpirationUnit,
}

impl Expiration {
    /// Lifetime as a duration
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.amount.saturating_mul(self.unit.seconds()))
    }
}

impl FromStr for Expiration {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = EXPIRATION_REGEX
            .captures(s.trim())
            .ok_or_else(|| ConfigError::InvalidExpiration(s.to_string()))?;

        let amount = caps["amount"]
            .parse()
            .map_err(|_| ConfigError::InvalidExpiration(s.to_string()))?;
        let unit = match &caps["unit"] {
            "m" => ExpirationUnit::Minutes,
            "h" => ExpirationUnit::Hours,
            "d" => ExpirationUnit::Days,
            _ => ExpirationUnit::Weeks,
        };

        Ok(Self { amount, unit })
    }
}

impl fmt::Display for Expiration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{}{}", self.amount, self.unit.suffix())
    }
}
