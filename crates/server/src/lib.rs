#![warn(missing_docs)]
//! Hologram host: the visibility scheduler, the editing service, persistence,
//! and the startup/shutdown sequence tying them to the apply context.

mod host;
mod saver;
mod scheduler;
mod service;
mod store;
mod viewers;

pub use host::{Host, HostConfig, HostParts, ShutdownReport};
pub use saver::{save_now, SaveTrigger, Saver};
pub use scheduler::{
    decide, PassReport, SchedulerHandle, Transition, VisibilityError, VisibilityScheduler,
};
pub use service::{HologramService, NearEntry, ServiceParts, NEAR_PAGE_SIZE};
pub use store::{restore, HologramStore, JsonFileStore, LoadReport};
pub use viewers::{LoadedWorlds, ViewerDirectory, ViewerSnapshot, WorldDirectory};
