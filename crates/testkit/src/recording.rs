//! A [`ViewerSink`] that records every message for later assertions.

use glam::DVec3;
use mdholo_core::{EntityId, ViewerId};
use mdholo_net::{HoloMessage, SinkError, ViewerSink};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashSet};

#[derive(Default)]
struct Log {
    messages: Vec<(ViewerId, HoloMessage)>,
    failing: HashSet<ViewerId>,
}

/// Records delivered messages in order, per viewer.
#[derive(Default)]
pub struct RecordingSink {
    log: Mutex<Log>,
}

impl RecordingSink {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every later send to `viewer` as disconnected.
    pub fn fail_for(&self, viewer: ViewerId) {
        self.log.lock().failing.insert(viewer);
    }

    /// Forget recorded messages (failure settings are kept).
    pub fn clear(&self) {
        self.log.lock().messages.clear();
    }

    /// Every message delivered to `viewer`, in order.
    pub fn messages(&self, viewer: ViewerId) -> Vec<HoloMessage> {
        self.log
            .lock()
            .messages
            .iter()
            .filter(|(v, _)| *v == viewer)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Number of messages delivered to `viewer`.
    pub fn count_for(&self, viewer: ViewerId) -> usize {
        self.log
            .lock()
            .messages
            .iter()
            .filter(|(v, _)| *v == viewer)
            .count()
    }

    /// Total messages delivered.
    pub fn total(&self) -> usize {
        self.log.lock().messages.len()
    }

    /// Entities `viewer` should currently have, replaying spawns and despawns.
    pub fn spawned(&self, viewer: ViewerId) -> Vec<EntityId> {
        let mut live = BTreeSet::new();
        for message in self.messages(viewer) {
            match message {
                HoloMessage::SpawnText { entity, .. } | HoloMessage::SpawnItem { entity, .. } => {
                    live.insert(entity);
                }
                HoloMessage::Despawn { entity } => {
                    live.remove(&entity);
                }
                _ => {}
            }
        }
        live.into_iter().collect()
    }

    /// Spawn messages for `entity` sent to `viewer`.
    pub fn spawn_count(&self, viewer: ViewerId, entity: EntityId) -> usize {
        self.messages(viewer)
            .iter()
            .filter(|m| {
                matches!(m, HoloMessage::SpawnText { .. } | HoloMessage::SpawnItem { .. })
                    && m.entity() == entity
            })
            .count()
    }

    /// Despawn messages for `entity` sent to `viewer`.
    pub fn despawn_count(&self, viewer: ViewerId, entity: EntityId) -> usize {
        self.messages(viewer)
            .iter()
            .filter(|m| matches!(m, HoloMessage::Despawn { entity: e } if *e == entity))
            .count()
    }

    /// Latest text sent to `viewer` for `entity`.
    pub fn text_of(&self, viewer: ViewerId, entity: EntityId) -> Option<String> {
        self.messages(viewer)
            .into_iter()
            .rev()
            .find_map(|m| match m {
                HoloMessage::SpawnText { entity: e, text, .. }
                | HoloMessage::UpdateText { entity: e, text }
                    if e == entity =>
                {
                    Some(text)
                }
                _ => None,
            })
    }

    /// Latest position sent to `viewer` for `entity`.
    pub fn position_of(&self, viewer: ViewerId, entity: EntityId) -> Option<DVec3> {
        self.messages(viewer)
            .into_iter()
            .rev()
            .find_map(|m| match m {
                HoloMessage::SpawnText {
                    entity: e,
                    position,
                    ..
                }
                | HoloMessage::SpawnItem {
                    entity: e,
                    position,
                    ..
                }
                | HoloMessage::Teleport {
                    entity: e,
                    position,
                } if e == entity => Some(position),
                _ => None,
            })
    }
}

impl ViewerSink for RecordingSink {
    fn send(&self, viewer: ViewerId, message: HoloMessage) -> Result<(), SinkError> {
        let mut log = self.log.lock();
        if log.failing.contains(&viewer) {
            return Err(SinkError::Disconnected(viewer));
        }
        log.messages.push((viewer, message));
        Ok(())
    }
}
