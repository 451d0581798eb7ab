//! The apply context: the single place where viewer-visible side effects run.
//!
//! It owns the per-viewer entity ledger (which entities each viewer currently
//! has spawned) and is the only writer of every hologram's visibility set.
//! Spawns are skipped for entities already in a viewer's ledger and despawns
//! for entities absent from it, so interleaved scheduler and edit intents never
//! produce duplicate spawns or despawns.

use crate::dispatch::{ApplyOp, Command, Dispatcher};
use crate::hologram::Hologram;
use crate::registry::HologramRegistry;
use glam::DVec3;
use mdholo_core::{EntityId, ViewerId};
use mdholo_net::{HoloMessage, ViewerSink};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Counters describing what the apply context has done.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplyStats {
    /// Ops executed.
    pub ops: u64,
    /// Messages delivered.
    pub sent: u64,
    /// Messages the sink rejected.
    pub failed: u64,
}

/// Sole executor of entity-affecting ops.
pub struct ApplyContext {
    rx: mpsc::UnboundedReceiver<Command>,
    registry: Arc<HologramRegistry>,
    sink: Arc<dyn ViewerSink>,
    ledger: HashMap<ViewerId, HashSet<EntityId>>,
    stats: ApplyStats,
}

impl ApplyContext {
    /// Create the context and the dispatcher feeding it.
    pub fn new(registry: Arc<HologramRegistry>, sink: Arc<dyn ViewerSink>) -> (Self, Dispatcher) {
        let (dispatch, rx) = Dispatcher::channel();
        let ctx = Self {
            rx,
            registry,
            sink,
            ledger: HashMap::new(),
            stats: ApplyStats::default(),
        };
        (ctx, dispatch)
    }

    /// Execute every op already queued, without waiting. Returns how many ran.
    ///
    /// Used by hosts that drive the apply context from their own main loop,
    /// and by tests.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(command) = self.rx.try_recv() {
            match command {
                Command::Apply(op) => {
                    self.apply(op);
                    ran += 1;
                }
                Command::Flush(done) => {
                    let _ = done.send(());
                }
                // Stop only ends `run`; here the queue is simply drained.
                Command::Stop => {}
            }
        }
        ran
    }

    /// Process ops until stopped or every dispatcher is dropped.
    pub async fn run(mut self) -> ApplyStats {
        debug!("apply context running");
        while let Some(command) = self.rx.recv().await {
            match command {
                Command::Apply(op) => self.apply(op),
                Command::Flush(done) => {
                    let _ = done.send(());
                }
                Command::Stop => break,
            }
        }
        debug!(?self.stats, "apply context stopped");
        self.stats
    }

    /// Counters so far.
    pub fn stats(&self) -> ApplyStats {
        self.stats
    }

    /// Entities currently spawned for `viewer`.
    pub fn spawned_for(&self, viewer: ViewerId) -> Vec<EntityId> {
        let mut entities: Vec<_> = self
            .ledger
            .get(&viewer)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        entities.sort();
        entities
    }

    /// Execute one op.
    pub fn apply(&mut self, op: ApplyOp) {
        trace!(?op, "apply");
        self.stats.ops += 1;
        match op {
            ApplyOp::ViewerJoined(viewer) => {
                self.ledger.entry(viewer).or_default();
            }
            ApplyOp::ViewerLeft(viewer) => {
                self.ledger.remove(&viewer);
                for hologram in self.registry.all() {
                    hologram.mark_hidden(viewer);
                }
            }
            ApplyOp::Show { hologram, viewer } => self.show(&hologram, viewer),
            ApplyOp::Hide { hologram, viewer } => self.hide(&hologram, viewer),
            ApplyOp::HideAll { hologram } => {
                for viewer in hologram.viewers() {
                    self.hide(&hologram, viewer);
                }
            }
            ApplyOp::SpawnLine { hologram, entity } => self.spawn_line(&hologram, entity),
            ApplyOp::DespawnEntity { entity } => self.despawn_everywhere(entity),
            ApplyOp::Reposition { hologram, from } => self.reposition(&hologram, from),
            ApplyOp::UpdateText { hologram, entity } => self.update_text(&hologram, entity),
        }
    }

    fn show(&mut self, hologram: &Arc<Hologram>, viewer: ViewerId) {
        if hologram.is_retired() || hologram.is_visible_to(viewer) {
            return;
        }
        let Some(spawned) = self.ledger.get_mut(&viewer) else {
            trace!(%viewer, "show for departed viewer dropped");
            return;
        };

        let mut outgoing = Vec::new();
        hologram.read_layout(|placement, lines| {
            for line in lines {
                if spawned.insert(line.entity()) {
                    outgoing.push(HoloMessage::SpawnText {
                        entity: line.entity(),
                        position: stacked_at(placement.anchor, line.offset()),
                        text: line.current_text().to_string(),
                    });
                }
            }
            if let Some(decoration) = hologram.decoration() {
                if spawned.insert(decoration.entity()) {
                    outgoing.push(decoration.spawn_message(placement.anchor));
                }
            }
        });
        hologram.mark_visible(viewer);
        debug!(id = %hologram.id(), %viewer, "hologram shown");
        self.send_all(viewer, outgoing);
    }

    fn hide(&mut self, hologram: &Arc<Hologram>, viewer: ViewerId) {
        if !hologram.mark_hidden(viewer) {
            return;
        }
        let Some(spawned) = self.ledger.get_mut(&viewer) else {
            return;
        };

        let mut outgoing = Vec::new();
        hologram.read_layout(|_, lines| {
            let entities = lines
                .iter()
                .map(|line| line.entity())
                .chain(hologram.decoration().map(|d| d.entity()));
            for entity in entities {
                if spawned.remove(&entity) {
                    outgoing.push(HoloMessage::Despawn { entity });
                }
            }
        });
        debug!(id = %hologram.id(), %viewer, "hologram hidden");
        self.send_all(viewer, outgoing);
    }

    fn spawn_line(&mut self, hologram: &Arc<Hologram>, entity: EntityId) {
        if hologram.is_retired() {
            return;
        }
        let message = hologram.read_layout(|placement, lines| {
            lines
                .iter()
                .find(|line| line.entity() == entity)
                .map(|line| HoloMessage::SpawnText {
                    entity,
                    position: stacked_at(placement.anchor, line.offset()),
                    text: line.current_text().to_string(),
                })
        });
        let Some(message) = message else {
            // Removed again before we got to it.
            return;
        };

        for viewer in hologram.viewers() {
            let Some(spawned) = self.ledger.get_mut(&viewer) else {
                continue;
            };
            if spawned.insert(entity) {
                self.send(viewer, message.clone());
            }
        }
    }

    fn despawn_everywhere(&mut self, entity: EntityId) {
        let holders: Vec<ViewerId> = self
            .ledger
            .iter_mut()
            .filter_map(|(viewer, spawned)| spawned.remove(&entity).then_some(*viewer))
            .collect();
        for viewer in holders {
            self.send(viewer, HoloMessage::Despawn { entity });
        }
    }

    fn reposition(&mut self, hologram: &Arc<Hologram>, from: usize) {
        let moves: Vec<(EntityId, DVec3)> = hologram.read_layout(|placement, lines| {
            lines
                .iter()
                .skip(from)
                .map(|line| (line.entity(), stacked_at(placement.anchor, line.offset())))
                .collect()
        });
        for viewer in hologram.viewers() {
            let Some(spawned) = self.ledger.get(&viewer) else {
                continue;
            };
            let outgoing: Vec<_> = moves
                .iter()
                .filter(|(entity, _)| spawned.contains(entity))
                .map(|&(entity, position)| HoloMessage::Teleport { entity, position })
                .collect();
            self.send_all(viewer, outgoing);
        }
    }

    fn update_text(&mut self, hologram: &Arc<Hologram>, entity: EntityId) {
        let text = hologram.read_layout(|_, lines| {
            lines
                .iter()
                .find(|line| line.entity() == entity)
                .map(|line| line.current_text().to_string())
        });
        let Some(text) = text else {
            return;
        };
        for viewer in hologram.viewers() {
            let spawned = self
                .ledger
                .get(&viewer)
                .is_some_and(|set| set.contains(&entity));
            if spawned {
                self.send(
                    viewer,
                    HoloMessage::UpdateText {
                        entity,
                        text: text.clone(),
                    },
                );
            }
        }
    }

    fn send_all(&mut self, viewer: ViewerId, messages: Vec<HoloMessage>) {
        for message in messages {
            self.send(viewer, message);
        }
    }

    fn send(&mut self, viewer: ViewerId, message: HoloMessage) {
        let entity = message.entity();
        match self.sink.send(viewer, message) {
            Ok(()) => self.stats.sent += 1,
            Err(err) => {
                self.stats.failed += 1;
                warn!(%viewer, %entity, %err, "failed to deliver hologram message");
            }
        }
    }
}

fn stacked_at(anchor: DVec3, offset: f64) -> DVec3 {
    DVec3::new(anchor.x, offset, anchor.z)
}
