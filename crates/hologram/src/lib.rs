#![warn(missing_docs)]
//! Hologram line stacks, their edit algebra, and the apply context that turns
//! edits and visibility transitions into per-viewer entity messages.

mod apply;
mod decoration;
mod dispatch;
mod error;
mod hologram;
mod line;
mod ranking;
mod record;
mod registry;

pub use apply::{ApplyContext, ApplyStats};
pub use decoration::{Decoration, ItemDecoration};
pub use dispatch::{ApplyOp, Dispatcher};
pub use error::HoloError;
pub use hologram::{Hologram, HologramInfo, HologramKind, Placement};
pub use line::{Line, LineContent};
pub use ranking::{
    ContentProvider, DataSources, NoRankings, RankEntry, RankingBoard, RankingConfig,
    RankingSource,
};
pub use record::{from_record, to_record, AnimatedRecord, HologramRecord, KindRecord, LineRecord};
pub use registry::HologramRegistry;
