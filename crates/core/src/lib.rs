#![warn(missing_docs)]
//! Core primitives shared across the hologram workspace.

pub mod entity;
pub mod id;
pub mod world;

use serde::{Deserialize, Serialize};

// Re-export commonly used types
pub use entity::{EntityId, EntityIdAllocator, ViewerId};
pub use id::{HologramId, HologramIdError};
pub use world::WorldId;

/// Vertical spacing between stacked lines, in blocks.
pub const GAP: f64 = 0.25;

/// Height above the anchor at which an item decoration floats.
pub const ITEM_OFFSET: f64 = 0.6;

/// Simulation ticks per second.
pub const TICKS_PER_SECOND: u64 = 20;

/// Wall-clock length of one simulation tick in milliseconds.
pub const TICK_MILLIS: u64 = 1000 / TICKS_PER_SECOND;

/// Fixed tick type (20 TPS => 50 ms per tick).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SimTick(pub u64);

impl SimTick {
    /// First tick in any timeline.
    pub const ZERO: Self = Self(0);

    /// Advance by `delta` ticks.
    pub fn advance(self, delta: u64) -> Self {
        Self(self.0 + delta)
    }

    /// Number of whole ticks covered by a wall-clock interval, at least one.
    pub fn from_millis(millis: u64) -> u64 {
        (millis / TICK_MILLIS).max(1)
    }
}

/// Vertical position of the line at `index` for a stack anchored at `anchor_y`.
pub fn line_offset(anchor_y: f64, index: usize) -> f64 {
    anchor_y - index as f64 * GAP
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_step_down_by_gap() {
        assert_eq!(line_offset(64.0, 0), 64.0);
        assert_eq!(line_offset(64.0, 1), 63.75);
        assert_eq!(line_offset(64.0, 4), 63.0);
    }

    #[test]
    fn tick_conversion_rounds_down_but_never_to_zero() {
        assert_eq!(SimTick::from_millis(500), 10);
        assert_eq!(SimTick::from_millis(75), 1);
        assert_eq!(SimTick::from_millis(0), 1);
        assert_eq!(SimTick::ZERO.advance(3), SimTick(3));
    }
}
