//! Delivery of hologram messages to individual viewers.

use crate::codec::encode_message;
use crate::protocol::HoloMessage;
use mdholo_core::ViewerId;
use parking_lot::Mutex;
use std::collections::HashMap;
use thiserror::Error;
use tracing::trace;

/// Failure delivering a message to one viewer.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The viewer's connection is gone (stale reference).
    #[error("{0} is not connected")]
    Disconnected(ViewerId),
    /// The message breaks protocol limits and was not queued.
    #[error("refused message for {viewer}: {reason}")]
    Rejected {
        /// Target viewer.
        viewer: ViewerId,
        /// Limit that was broken.
        reason: &'static str,
    },
    /// The message could not be encoded.
    #[error("failed to encode message for {viewer}: {reason}")]
    Encode {
        /// Target viewer.
        viewer: ViewerId,
        /// Underlying error text.
        reason: String,
    },
}

/// Connection-layer endpoint that delivers messages to viewers.
///
/// Only the apply context calls this.
pub trait ViewerSink: Send + Sync {
    /// Deliver one message to one viewer.
    fn send(&self, viewer: ViewerId, message: HoloMessage) -> Result<(), SinkError>;
}

/// Sink that encodes messages into per-viewer frame queues.
///
/// The connection layer drains a viewer's queue with [`FramedOutbox::take`]
/// and writes the frames to the socket.
#[derive(Default)]
pub struct FramedOutbox {
    queues: Mutex<HashMap<ViewerId, Vec<Vec<u8>>>>,
}

impl FramedOutbox {
    /// Create an empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a queue for a newly connected viewer.
    pub fn connect(&self, viewer: ViewerId) {
        self.queues.lock().entry(viewer).or_default();
    }

    /// Drop a viewer's queue. Pending frames are discarded.
    pub fn disconnect(&self, viewer: ViewerId) {
        self.queues.lock().remove(&viewer);
    }

    /// Take every pending frame for `viewer`.
    pub fn take(&self, viewer: ViewerId) -> Vec<Vec<u8>> {
        self.queues
            .lock()
            .get_mut(&viewer)
            .map(std::mem::take)
            .unwrap_or_default()
    }

    /// Number of frames waiting for `viewer`.
    pub fn pending(&self, viewer: ViewerId) -> usize {
        self.queues.lock().get(&viewer).map_or(0, Vec::len)
    }
}

impl ViewerSink for FramedOutbox {
    fn send(&self, viewer: ViewerId, message: HoloMessage) -> Result<(), SinkError> {
        message
            .verify()
            .map_err(|reason| SinkError::Rejected { viewer, reason })?;
        let frame = encode_message(&message).map_err(|err| SinkError::Encode {
            viewer,
            reason: format!("{err:#}"),
        })?;
        let mut queues = self.queues.lock();
        let queue = queues
            .get_mut(&viewer)
            .ok_or(SinkError::Disconnected(viewer))?;
        trace!(%viewer, bytes = frame.len(), "queued hologram frame");
        queue.push(frame);
        Ok(())
    }
}
