//! Intents marshalled into the apply context.
//!
//! Edit operations and the visibility scheduler never touch viewer state
//! themselves. They enqueue [`ApplyOp`]s through a [`Dispatcher`]; the apply
//! context executes them one at a time, in order, reading hologram state at
//! apply time.

use crate::hologram::Hologram;
use mdholo_core::{EntityId, ViewerId};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Entity-affecting side effect to run in the apply context.
pub enum ApplyOp {
    /// A viewer connected; start tracking its spawned entities.
    ViewerJoined(ViewerId),
    /// A viewer disconnected; forget it everywhere without sending despawns.
    ViewerLeft(ViewerId),
    /// Spawn every line (and decoration) for `viewer`, then mark it visible.
    Show {
        /// Target hologram.
        hologram: Arc<Hologram>,
        /// Viewer entering range.
        viewer: ViewerId,
    },
    /// Despawn everything for `viewer`, then mark it not visible.
    Hide {
        /// Target hologram.
        hologram: Arc<Hologram>,
        /// Viewer leaving range.
        viewer: ViewerId,
    },
    /// Hide for every current viewer.
    HideAll {
        /// Target hologram.
        hologram: Arc<Hologram>,
    },
    /// Spawn a newly added line for every current viewer.
    SpawnLine {
        /// Owning hologram.
        hologram: Arc<Hologram>,
        /// Entity of the new line.
        entity: EntityId,
    },
    /// Despawn an entity wherever it is spawned.
    DespawnEntity {
        /// Entity of a removed line.
        entity: EntityId,
    },
    /// Re-send positions of lines at index `from` and below.
    Reposition {
        /// Owning hologram.
        hologram: Arc<Hologram>,
        /// First shifted line.
        from: usize,
    },
    /// Push a content-only update for one line.
    UpdateText {
        /// Owning hologram.
        hologram: Arc<Hologram>,
        /// Entity of the changed line.
        entity: EntityId,
    },
}

impl fmt::Debug for ApplyOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyOp::ViewerJoined(v) => write!(f, "ViewerJoined({v})"),
            ApplyOp::ViewerLeft(v) => write!(f, "ViewerLeft({v})"),
            ApplyOp::Show { hologram, viewer } => write!(f, "Show({}, {viewer})", hologram.id()),
            ApplyOp::Hide { hologram, viewer } => write!(f, "Hide({}, {viewer})", hologram.id()),
            ApplyOp::HideAll { hologram } => write!(f, "HideAll({})", hologram.id()),
            ApplyOp::SpawnLine { hologram, entity } => {
                write!(f, "SpawnLine({}, {entity})", hologram.id())
            }
            ApplyOp::DespawnEntity { entity } => write!(f, "DespawnEntity({entity})"),
            ApplyOp::Reposition { hologram, from } => {
                write!(f, "Reposition({}, from {from})", hologram.id())
            }
            ApplyOp::UpdateText { hologram, entity } => {
                write!(f, "UpdateText({}, {entity})", hologram.id())
            }
        }
    }
}

pub(crate) enum Command {
    Apply(ApplyOp),
    Flush(oneshot::Sender<()>),
    Stop,
}

/// Non-blocking handle for enqueueing work into the apply context.
#[derive(Clone)]
pub struct Dispatcher {
    tx: mpsc::UnboundedSender<Command>,
}

impl Dispatcher {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<Command>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueue an op. Never blocks; ops sent after shutdown are dropped.
    pub fn dispatch(&self, op: ApplyOp) {
        if let Err(err) = self.tx.send(Command::Apply(op)) {
            if let Command::Apply(op) = err.0 {
                debug!(?op, "apply context stopped; dropping op");
            }
        }
    }

    /// Resolves once every op enqueued before this call has been applied.
    ///
    /// Resolves with an error if the apply context stops first.
    pub fn flush(&self) -> oneshot::Receiver<()> {
        let (done_tx, done_rx) = oneshot::channel();
        // A closed channel drops `done_tx`, which errors the receiver.
        let _ = self.tx.send(Command::Flush(done_tx));
        done_rx
    }

    /// Ask the apply context to exit after the ops already queued.
    pub fn stop(&self) {
        let _ = self.tx.send(Command::Stop);
    }
}
