//! World identifiers.
//!
//! Worlds are opaque to the hologram core: name resolution and loading belong
//! to the host. The core only compares identifiers for equality.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier for a loaded world.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldId(String);

impl WorldId {
    /// Wrap a world name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Canonical string key used in records and logs.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorldId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
