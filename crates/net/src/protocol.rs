//! Protocol message definitions for hologram entities.
//!
//! All messages use postcard serialization for compact binary encoding.

use glam::DVec3;
use mdholo_core::EntityId;
use serde::{Deserialize, Serialize};

/// Maximum length of a single line of text (bytes).
pub const MAX_TEXT_LEN: usize = 1024;

/// Messages sent from the host to one viewer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum HoloMessage {
    /// Spawn a floating text entity.
    SpawnText {
        /// Entity id shared by every viewer of the line.
        entity: EntityId,
        /// World-space position.
        position: DVec3,
        /// Text to display.
        text: String,
    },

    /// Spawn a floating item decoration.
    SpawnItem {
        /// Entity id of the decoration.
        entity: EntityId,
        /// World-space position.
        position: DVec3,
        /// Item identifier (e.g. `diamond_sword`).
        item: String,
    },

    /// Replace the text of an already spawned entity.
    UpdateText {
        /// Target entity.
        entity: EntityId,
        /// New text.
        text: String,
    },

    /// Move an already spawned entity.
    Teleport {
        /// Target entity.
        entity: EntityId,
        /// New world-space position.
        position: DVec3,
    },

    /// Remove an entity from the viewer's client.
    Despawn {
        /// Target entity.
        entity: EntityId,
    },
}

impl HoloMessage {
    /// Entity this message targets.
    pub fn entity(&self) -> EntityId {
        match self {
            HoloMessage::SpawnText { entity, .. }
            | HoloMessage::SpawnItem { entity, .. }
            | HoloMessage::UpdateText { entity, .. }
            | HoloMessage::Teleport { entity, .. }
            | HoloMessage::Despawn { entity } => *entity,
        }
    }

    /// Verify message limits and validity.
    pub fn verify(&self) -> Result<(), &'static str> {
        match self {
            HoloMessage::SpawnText { text, position, .. } => {
                if text.len() > MAX_TEXT_LEN {
                    return Err("Line text too long");
                }
                if !position.is_finite() {
                    return Err("Non-finite position");
                }
            }
            HoloMessage::UpdateText { text, .. } => {
                if text.len() > MAX_TEXT_LEN {
                    return Err("Line text too long");
                }
            }
            HoloMessage::SpawnItem { position, .. } | HoloMessage::Teleport { position, .. } => {
                if !position.is_finite() {
                    return Err("Non-finite position");
                }
            }
            HoloMessage::Despawn { .. } => {}
        }
        Ok(())
    }
}
