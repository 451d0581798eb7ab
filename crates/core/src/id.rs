//! Hologram identifiers.
//!
//! Ids are compared case-insensitively but keep the spelling they were created
//! with for display and persistence.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

/// Maximum id length in characters.
pub const MAX_ID_LEN: usize = 64;

/// Error returned when parsing an invalid [`HologramId`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HologramIdError {
    /// Id was empty or whitespace.
    #[error("hologram id cannot be empty")]
    Empty,
    /// Id exceeded [`MAX_ID_LEN`].
    #[error("hologram id too long (max 64)")]
    TooLong,
    /// Id contained characters outside `A-Za-z0-9_-`.
    #[error("hologram id {0:?} has invalid characters (allowed: A-Za-z0-9_-)")]
    InvalidChars(String),
}

/// Case-insensitive hologram identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HologramId {
    name: String,
    key: String,
}

impl HologramId {
    /// Parse and validate an id.
    pub fn parse(input: &str) -> Result<Self, HologramIdError> {
        let name = input.trim();
        if name.is_empty() {
            return Err(HologramIdError::Empty);
        }
        if name.chars().count() > MAX_ID_LEN {
            return Err(HologramIdError::TooLong);
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
        {
            return Err(HologramIdError::InvalidChars(name.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            key: name.to_ascii_lowercase(),
        })
    }

    /// Spelling the id was created with.
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Lower-cased lookup key.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl PartialEq for HologramId {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for HologramId {}

impl Hash for HologramId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for HologramId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HologramId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Display for HologramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl FromStr for HologramId {
    type Err = HologramIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for HologramId {
    type Error = HologramIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<HologramId> for String {
    fn from(value: HologramId) -> Self {
        value.name
    }
}
