//! Debounced background persistence.
//!
//! Mutations request a save; the saver coalesces bursts so at most one write
//! happens per cooldown window, and the write itself runs off the async
//! workers.

use crate::store::HologramStore;
use anyhow::{anyhow, Result};
use mdholo_hologram::{to_record, HologramRegistry};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

enum Signal {
    Request,
    Stop,
}

/// Cheap handle for requesting a save. Never blocks.
#[derive(Clone, Default)]
pub struct SaveTrigger {
    tx: Option<mpsc::UnboundedSender<Signal>>,
}

impl SaveTrigger {
    /// Trigger that ignores requests.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Ask for the current state to be written soon.
    pub fn request(&self) {
        if let Some(tx) = &self.tx {
            if tx.send(Signal::Request).is_err() {
                debug!("save requested after saver stopped");
            }
        }
    }
}

/// Running saver task.
pub struct Saver {
    trigger: SaveTrigger,
    join: JoinHandle<u64>,
}

impl Saver {
    /// Start the saver on the tokio runtime.
    pub fn spawn(
        registry: Arc<HologramRegistry>,
        store: Arc<dyn HologramStore>,
        cooldown: Duration,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let join = tokio::spawn(run(registry, store, cooldown, rx));
        Self {
            trigger: SaveTrigger { tx: Some(tx) },
            join,
        }
    }

    /// Handle for requesting saves.
    pub fn trigger(&self) -> SaveTrigger {
        self.trigger.clone()
    }

    /// Stop the saver, abandoning any write still in its cooldown.
    ///
    /// Returns the number of writes performed, or `None` if it did not exit
    /// within `timeout`.
    pub async fn stop(self, timeout: Duration) -> Option<u64> {
        if let Some(tx) = &self.trigger.tx {
            let _ = tx.send(Signal::Stop);
        }
        match tokio::time::timeout(timeout, self.join).await {
            Ok(Ok(writes)) => Some(writes),
            Ok(Err(err)) => {
                warn!("saver task failed: {err}");
                None
            }
            Err(_) => {
                warn!("saver did not stop in time");
                None
            }
        }
    }
}

async fn run(
    registry: Arc<HologramRegistry>,
    store: Arc<dyn HologramStore>,
    cooldown: Duration,
    mut rx: mpsc::UnboundedReceiver<Signal>,
) -> u64 {
    let mut last_write: Option<Instant> = None;
    let mut writes = 0;

    'outer: while let Some(signal) = rx.recv().await {
        if let Signal::Stop = signal {
            break;
        }

        // Wait out the cooldown, absorbing requests that arrive meanwhile.
        if let Some(last) = last_write {
            let sleep = tokio::time::sleep_until(last + cooldown);
            tokio::pin!(sleep);
            loop {
                tokio::select! {
                    _ = &mut sleep => break,
                    next = rx.recv() => match next {
                        Some(Signal::Request) => {}
                        Some(Signal::Stop) | None => break 'outer,
                    },
                }
            }
        }
        loop {
            match rx.try_recv() {
                Ok(Signal::Request) => {}
                Ok(Signal::Stop) => break 'outer,
                Err(_) => break,
            }
        }

        write(&registry, &store).await;
        writes += 1;
        last_write = Some(Instant::now());
    }

    debug!(writes, "saver stopped");
    writes
}

async fn write(registry: &HologramRegistry, store: &Arc<dyn HologramStore>) {
    if let Err(err) = save_snapshot(registry, Arc::clone(store)).await {
        warn!("Failed to save holograms: {err:#}");
    }
}

async fn save_snapshot(registry: &HologramRegistry, store: Arc<dyn HologramStore>) -> Result<()> {
    let records: Vec<_> = registry.all().iter().map(|h| to_record(h)).collect();
    let count = records.len();
    tokio::task::spawn_blocking(move || store.save(&records))
        .await
        .map_err(|err| anyhow!("save task failed: {err}"))??;
    debug!(count, "holograms saved");
    Ok(())
}

/// Write the current state once, giving up after `timeout`.
pub async fn save_now(
    registry: &HologramRegistry,
    store: Arc<dyn HologramStore>,
    timeout: Duration,
) -> Result<()> {
    tokio::time::timeout(timeout, save_snapshot(registry, store))
        .await
        .map_err(|_| anyhow!("final save exceeded {} ms", timeout.as_millis()))??;
    info!("final save complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdholo_hologram::{HoloError, HologramRecord};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct CountingStore {
        saves: Mutex<Vec<usize>>,
    }

    impl HologramStore for CountingStore {
        fn load(&self) -> Result<Vec<Result<HologramRecord, HoloError>>> {
            Ok(Vec::new())
        }

        fn save(&self, records: &[HologramRecord]) -> Result<()> {
            self.saves.lock().push(records.len());
            Ok(())
        }
    }

    struct SlowStore;

    impl HologramStore for SlowStore {
        fn load(&self) -> Result<Vec<Result<HologramRecord, HoloError>>> {
            Ok(Vec::new())
        }

        fn save(&self, _records: &[HologramRecord]) -> Result<()> {
            std::thread::sleep(Duration::from_millis(300));
            Ok(())
        }
    }

    #[tokio::test]
    async fn bursts_collapse_into_one_write_per_cooldown() {
        let store = Arc::new(CountingStore::default());
        let saver = Saver::spawn(
            Arc::new(HologramRegistry::new()),
            store.clone(),
            Duration::from_millis(300),
        );
        let trigger = saver.trigger();

        trigger.request();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.saves.lock().len(), 1);

        for _ in 0..20 {
            trigger.request();
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(store.saves.lock().len(), 1);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(store.saves.lock().len(), 2);

        assert_eq!(saver.stop(Duration::from_secs(1)).await, Some(2));
    }

    #[tokio::test]
    async fn disabled_trigger_is_inert() {
        SaveTrigger::disabled().request();
    }

    #[tokio::test]
    async fn final_save_is_bounded() {
        let registry = HologramRegistry::new();
        let err = save_now(&registry, Arc::new(SlowStore), Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("final save exceeded"));

        let store = Arc::new(CountingStore::default());
        save_now(&registry, store.clone(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(*store.saves.lock(), vec![0]);
    }
}
