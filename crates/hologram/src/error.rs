//! Error taxonomy for hologram operations.

use mdholo_core::HologramIdError;
use thiserror::Error;

/// Recoverable, reportable failures returned to the command layer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HoloError {
    /// No hologram with this id.
    #[error("hologram {0:?} not found")]
    NotFound(String),

    /// A hologram with this id already exists.
    #[error("hologram {0:?} already exists")]
    AlreadyExists(String),

    /// Line index out of bounds.
    #[error("line index {index} out of bounds (hologram has {len} lines)")]
    InvalidIndex {
        /// Requested index.
        index: usize,
        /// Line count at the time of the call.
        len: usize,
    },

    /// Attempt to remove the only remaining line.
    #[error("hologram {0:?} has a single line; delete the hologram instead")]
    LastLineViolation(String),

    /// Referenced world is not loaded.
    #[error("world {0:?} not found")]
    WorldNotFound(String),

    /// A persisted record could not be turned into a hologram.
    #[error("malformed record {id:?}: {reason}")]
    MalformedRecord {
        /// Record id, or `<unknown>` when the id itself is unreadable.
        id: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A hologram or animated line would end up with no content.
    #[error("a hologram needs at least one line and animations at least one frame")]
    EmptyLines,

    /// Animated line whose frames would change every tick count of zero.
    #[error("animation interval must be at least one tick")]
    ZeroInterval,

    /// Line text longer than the protocol carries.
    #[error("line text is {len} bytes, the limit is {max}")]
    LineTooLong {
        /// Offending length in bytes.
        len: usize,
        /// Protocol limit.
        max: usize,
    },

    /// Rejected hologram id.
    #[error(transparent)]
    InvalidId(#[from] HologramIdError),

    /// Variant settings that would not survive a store round trip.
    #[error("invalid {kind} settings: {reason}")]
    InvalidKind {
        /// Variant label.
        kind: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// Non-finite anchor or non-positive range.
    #[error("invalid placement: {0}")]
    InvalidPlacement(String),
}

impl HoloError {
    pub(crate) fn malformed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            id: id.into(),
            reason: reason.into(),
        }
    }
}
