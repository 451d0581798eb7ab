//! Startup and shutdown of the hologram runtime: registry, apply task,
//! scheduler, and saver.

use crate::saver::{save_now, Saver};
use crate::scheduler::{SchedulerHandle, VisibilityScheduler};
use crate::service::{HologramService, ServiceParts};
use crate::store::{restore, HologramStore, LoadReport};
use crate::viewers::{ViewerDirectory, WorldDirectory};
use anyhow::Result;
use mdholo_core::{EntityIdAllocator, WorldId};
use mdholo_hologram::{ApplyContext, ApplyOp, ApplyStats, DataSources, Dispatcher, HologramRegistry};
use mdholo_net::ViewerSink;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Runtime tuning, usually read from `config/host.toml`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HostConfig {
    /// Period of the visibility scheduler.
    pub scheduler_interval_ms: u64,
    /// Minimum spacing between debounced writes.
    pub save_cooldown_ms: u64,
    /// Bound for the final save and each shutdown join.
    pub shutdown_timeout_ms: u64,
    /// Range given to holograms created without one.
    pub default_range: f64,
    /// JSON store location.
    pub data_path: PathBuf,
    /// Worlds treated as loaded by the headless host.
    pub worlds: Vec<String>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            scheduler_interval_ms: 500,
            save_cooldown_ms: 2000,
            shutdown_timeout_ms: 5000,
            default_range: 48.0,
            data_path: PathBuf::from("data/holograms.json"),
            worlds: vec!["world".to_string()],
        }
    }
}

impl HostConfig {
    /// Scheduler period.
    pub fn scheduler_interval(&self) -> Duration {
        Duration::from_millis(self.scheduler_interval_ms.max(1))
    }

    /// Debounce window.
    pub fn save_cooldown(&self) -> Duration {
        Duration::from_millis(self.save_cooldown_ms)
    }

    /// Shutdown bound.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Configured worlds as ids.
    pub fn world_ids(&self) -> Vec<WorldId> {
        self.worlds.iter().map(WorldId::new).collect()
    }
}

/// External collaborators plugged into a host.
pub struct HostParts {
    /// Delivery to connected viewers.
    pub sink: Arc<dyn ViewerSink>,
    /// Durable storage.
    pub store: Arc<dyn HologramStore>,
    /// World resolution.
    pub worlds: Arc<dyn WorldDirectory>,
    /// Data for self-refreshing holograms.
    pub sources: DataSources,
}

/// What shutdown managed to finish in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Final save completed.
    pub saved: bool,
    /// Scheduler loop exited.
    pub scheduler_stopped: bool,
    /// Apply task drained and exited.
    pub apply_stopped: bool,
    /// Apply counters, when the task exited.
    pub apply_stats: Option<ApplyStats>,
}

/// A running hologram runtime.
pub struct Host {
    config: HostConfig,
    registry: Arc<HologramRegistry>,
    dispatch: Dispatcher,
    store: Arc<dyn HologramStore>,
    service: Arc<HologramService>,
    scheduler: SchedulerHandle,
    saver: Saver,
    apply: JoinHandle<ApplyStats>,
    loaded: LoadReport,
}

impl Host {
    /// Restore stored holograms and start the background tasks.
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(config: HostConfig, parts: HostParts) -> Result<Self> {
        let registry = Arc::new(HologramRegistry::new());
        let entities = Arc::new(EntityIdAllocator::default());
        let viewers = Arc::new(ViewerDirectory::new());

        let loaded = restore(parts.store.as_ref(), &registry, &entities)?;

        let (apply, dispatch) = ApplyContext::new(Arc::clone(&registry), parts.sink);
        let apply = tokio::spawn(apply.run());

        let saver = Saver::spawn(
            Arc::clone(&registry),
            Arc::clone(&parts.store),
            config.save_cooldown(),
        );

        let service = Arc::new(HologramService::new(ServiceParts {
            registry: Arc::clone(&registry),
            dispatch: dispatch.clone(),
            entities,
            worlds: Arc::clone(&parts.worlds),
            viewers: Arc::clone(&viewers),
            saves: saver.trigger(),
            default_range: config.default_range,
        }));

        let scheduler = VisibilityScheduler::new(
            Arc::clone(&registry),
            viewers,
            parts.worlds,
            dispatch.clone(),
            parts.sources,
            config.scheduler_interval(),
        )
        .spawn(config.scheduler_interval());

        info!(holograms = registry.len(), "hologram host started");
        Ok(Self {
            config,
            registry,
            dispatch,
            store: parts.store,
            service,
            scheduler,
            saver,
            apply,
            loaded,
        })
    }

    /// Call surface for the command layer and connection hooks.
    pub fn service(&self) -> Arc<HologramService> {
        Arc::clone(&self.service)
    }

    /// Outcome of the startup restore.
    pub fn loaded(&self) -> LoadReport {
        self.loaded
    }

    /// Resolves once every op queued so far has been applied.
    pub async fn flush(&self) {
        let _ = self.dispatch.flush().await;
    }

    /// Save, stop the scheduler, despawn everything for everyone, then drain
    /// and stop the apply task. Every wait is bounded; timeouts are logged.
    pub async fn shutdown(self) -> ShutdownReport {
        let timeout = self.config.shutdown_timeout();
        let mut report = ShutdownReport::default();

        self.saver.stop(timeout).await;
        report.saved = match save_now(&self.registry, Arc::clone(&self.store), timeout).await {
            Ok(()) => true,
            Err(err) => {
                warn!("Final save failed: {err:#}");
                false
            }
        };

        report.scheduler_stopped = self.scheduler.stop(timeout).await;

        let holograms = self.registry.all();
        for hologram in &holograms {
            self.dispatch.dispatch(ApplyOp::HideAll {
                hologram: Arc::clone(hologram),
            });
        }
        self.dispatch.stop();

        match tokio::time::timeout(timeout, self.apply).await {
            Ok(Ok(stats)) => {
                report.apply_stopped = true;
                report.apply_stats = Some(stats);
            }
            Ok(Err(err)) => warn!("apply task failed: {err}"),
            Err(_) => warn!(timeout_ms = self.config.shutdown_timeout_ms, "apply task did not drain in time"),
        }

        info!(
            holograms = holograms.len(),
            saved = report.saved,
            scheduler_stopped = report.scheduler_stopped,
            apply_stopped = report.apply_stopped,
            "hologram host stopped"
        );
        report
    }
}
