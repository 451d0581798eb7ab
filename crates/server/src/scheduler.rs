//! Periodic visibility pass: decides who should perceive which hologram and
//! enqueues the transitions. Never sends anything itself.

use crate::viewers::{ViewerDirectory, ViewerSnapshot, WorldDirectory};
use mdholo_core::{SimTick, ViewerId};
use mdholo_hologram::{ApplyOp, DataSources, Dispatcher, HologramRegistry, Placement};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

/// Visibility change for one (hologram, viewer) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Viewer came into range.
    Show,
    /// Viewer left range or the hologram's world.
    Hide,
}

/// Failure evaluating one pair. Logged and skipped; the pass continues.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VisibilityError {
    /// Viewer reported a NaN or infinite position.
    #[error("viewer {0:?} has a non-finite position")]
    NonFinitePosition(ViewerId),
}

/// Decide the transition for one pair, if any.
///
/// A hologram in an unloaded world is hidden from everyone.
pub fn decide(
    viewer: &ViewerSnapshot,
    placement: &Placement,
    world_loaded: bool,
    visible: bool,
) -> Result<Option<Transition>, VisibilityError> {
    if !viewer.position.is_finite() {
        return Err(VisibilityError::NonFinitePosition(viewer.id));
    }
    let in_range = world_loaded && placement.contains(&viewer.world, viewer.position);
    Ok(match (in_range, visible) {
        (true, false) => Some(Transition::Show),
        (false, true) => Some(Transition::Hide),
        _ => None,
    })
}

/// Counters from one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Show intents enqueued.
    pub shown: usize,
    /// Hide intents enqueued.
    pub hidden: usize,
    /// Animated lines that changed frame.
    pub animated: usize,
    /// Holograms whose provider replaced their lines.
    pub refreshed: usize,
    /// Pairs skipped because evaluation failed.
    pub failures: usize,
}

/// Drives visibility and content timers for every registered hologram.
pub struct VisibilityScheduler {
    registry: Arc<HologramRegistry>,
    viewers: Arc<ViewerDirectory>,
    worlds: Arc<dyn WorldDirectory>,
    dispatch: Dispatcher,
    sources: DataSources,
    ticks_per_pass: u64,
    pass: SimTick,
}

impl VisibilityScheduler {
    /// Scheduler whose animation clock advances `interval` per pass.
    pub fn new(
        registry: Arc<HologramRegistry>,
        viewers: Arc<ViewerDirectory>,
        worlds: Arc<dyn WorldDirectory>,
        dispatch: Dispatcher,
        sources: DataSources,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            viewers,
            worlds,
            dispatch,
            sources,
            ticks_per_pass: SimTick::from_millis(interval.as_millis() as u64),
            pass: SimTick::ZERO,
        }
    }

    /// Passes run so far.
    pub fn pass(&self) -> SimTick {
        self.pass
    }

    /// Run one pass over every (hologram, viewer) pair.
    #[instrument(skip_all, fields(pass = self.pass.0))]
    pub fn tick(&mut self, now: Instant) -> PassReport {
        let viewers = self.viewers.snapshot();
        let mut report = PassReport::default();

        for hologram in self.registry.all() {
            report.animated += hologram.advance_animations(self.ticks_per_pass, &self.dispatch);
            match hologram.refresh_content(now, &self.sources, &self.dispatch) {
                Ok(true) => report.refreshed += 1,
                Ok(false) => {}
                Err(err) => warn!(id = %hologram.id(), "content refresh failed: {err}"),
            }

            let placement = hologram.placement();
            let loaded = self.worlds.is_loaded(&placement.world);
            for viewer in &viewers {
                match decide(viewer, &placement, loaded, hologram.is_visible_to(viewer.id)) {
                    Ok(Some(Transition::Show)) => {
                        report.shown += 1;
                        self.dispatch.dispatch(ApplyOp::Show {
                            hologram: Arc::clone(&hologram),
                            viewer: viewer.id,
                        });
                    }
                    Ok(Some(Transition::Hide)) => {
                        report.hidden += 1;
                        self.dispatch.dispatch(ApplyOp::Hide {
                            hologram: Arc::clone(&hologram),
                            viewer: viewer.id,
                        });
                    }
                    Ok(None) => {}
                    Err(err) => {
                        report.failures += 1;
                        warn!(id = %hologram.id(), "visibility check skipped: {err}");
                    }
                }
            }
        }

        self.pass = self.pass.advance(1);
        if report.shown + report.hidden > 0 {
            debug!(shown = report.shown, hidden = report.hidden, "visibility pass");
        }
        report
    }

    /// Run passes every `interval` on the tokio runtime until stopped.
    pub fn spawn(mut self, interval: Duration) -> SchedulerHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_ms = interval.as_millis() as u64, "visibility scheduler started");
            loop {
                ticker.tick().await;
                if flag.load(Ordering::Acquire) {
                    break;
                }
                self.tick(Instant::now());
            }
            info!(passes = self.pass.0, "visibility scheduler stopped");
        });
        SchedulerHandle { stop, join }
    }
}

/// Stop switch and join handle for a running scheduler.
pub struct SchedulerHandle {
    stop: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Ask the loop to exit before its next pass.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Stop and wait up to `timeout` for the loop to exit. Returns false on timeout.
    pub async fn stop(self, timeout: Duration) -> bool {
        self.request_stop();
        match tokio::time::timeout(timeout, self.join).await {
            Ok(Ok(())) => true,
            Ok(Err(err)) => {
                warn!("visibility scheduler task failed: {err}");
                true
            }
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "visibility scheduler did not stop in time");
                false
            }
        }
    }
}
