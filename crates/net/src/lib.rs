#![warn(missing_docs)]
//! Viewer-facing protocol: the messages the apply context sends to a single
//! viewer, their wire framing, and the sink abstraction the connection layer
//! implements.

mod codec;
mod protocol;
mod sink;

pub use codec::{decode_message, encode_message, FRAME_HEADER_LEN};
pub use protocol::{HoloMessage, MAX_TEXT_LEN};
pub use sink::{FramedOutbox, SinkError, ViewerSink};
