//! Extra visual payload attached above a hologram's line stack.
//!
//! A decoration has no visibility state of its own: the apply context spawns,
//! despawns and moves it together with the owning hologram's lines.

use crate::hologram::HologramKind;
use glam::DVec3;
use mdholo_core::{EntityId, ITEM_OFFSET};
use mdholo_net::HoloMessage;
use std::fmt;

/// Non-text visual bound 1:1 to a hologram's lifecycle.
pub trait Decoration: Send + Sync + fmt::Debug {
    /// Client entity backing the decoration.
    fn entity(&self) -> EntityId;

    /// Where the decoration floats for a stack anchored at `anchor`.
    fn position(&self, anchor: DVec3) -> DVec3;

    /// Message spawning the decoration for one viewer.
    fn spawn_message(&self, anchor: DVec3) -> HoloMessage;

    /// Persisted description of the decorated variant.
    fn kind(&self) -> HologramKind;
}

/// A single floating item above the top line.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemDecoration {
    item_id: String,
    entity: EntityId,
}

impl ItemDecoration {
    /// Decoration showing `item_id`, backed by `entity`.
    pub fn new(item_id: impl Into<String>, entity: EntityId) -> Self {
        Self {
            item_id: item_id.into(),
            entity,
        }
    }

    /// Item identifier.
    pub fn item_id(&self) -> &str {
        &self.item_id
    }
}

impl Decoration for ItemDecoration {
    fn entity(&self) -> EntityId {
        self.entity
    }

    fn position(&self, anchor: DVec3) -> DVec3 {
        anchor + DVec3::new(0.0, ITEM_OFFSET, 0.0)
    }

    fn spawn_message(&self, anchor: DVec3) -> HoloMessage {
        HoloMessage::SpawnItem {
            entity: self.entity,
            position: self.position(anchor),
            item: self.item_id.clone(),
        }
    }

    fn kind(&self) -> HologramKind {
        HologramKind::Item {
            item_id: self.item_id.clone(),
        }
    }
}
