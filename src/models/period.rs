//! Calendar period keys (`YYYY-MM`).

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a string is not a valid `YYYY-MM` period key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid period key '{0}' (expected YYYY-MM)")]
pub struct InvalidPeriodKey(pub String);

/// A calendar month identifying one stats period, e.g. `2025-12`.
///
/// Ordering is lexicographic on the underlying string, which matches
/// chronological order because the format is fixed-width.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeriodKey(String);

impl PeriodKey {
    /// Parse and validate a period key.
    pub fn parse(s: &str) -> Result<Self, InvalidPeriodKey> {
        let s = s.trim();
        let bytes = s.as_bytes();
        let well_formed = bytes.len() == 7
            && bytes[4] == b'-'
            && bytes
                .iter()
                .enumerate()
                .all(|(i, b)| i == 4 || b.is_ascii_digit());
        if !well_formed {
            return Err(InvalidPeriodKey(s.to_string()));
        }

        NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d")
            .map_err(|_| InvalidPeriodKey(s.to_string()))?;

        Ok(Self(s.to_string()))
    }

    /// Get the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeriodKey({})", self.0)
    }
}

impl FromStr for PeriodKey {
    type Err = InvalidPeriodKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PeriodKey {
    type Error = InvalidPeriodKey;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<PeriodKey> for String {
    fn from(key: PeriodKey) -> Self {
        key.0
    }
}
