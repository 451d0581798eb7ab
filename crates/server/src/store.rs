//! Durable storage of hologram records.

use anyhow::{Context, Result};
use mdholo_core::EntityIdAllocator;
use mdholo_hologram::{from_record, HoloError, HologramRecord, HologramRegistry};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Where hologram records live between runs.
pub trait HologramStore: Send + Sync {
    /// Every stored record, each parsed independently.
    ///
    /// The outer error means the store as a whole is unreadable; an inner
    /// error marks one malformed record.
    fn load(&self) -> Result<Vec<Result<HologramRecord, HoloError>>>;

    /// Replace the stored set with `records`.
    fn save(&self, records: &[HologramRecord]) -> Result<()>;
}

/// Records kept as a single JSON array in one file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store backed by `path`. The file is created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn parse_record(value: Value) -> Result<HologramRecord, HoloError> {
    let id = value
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or("<unknown>")
        .to_string();
    serde_json::from_value(value).map_err(|err| HoloError::MalformedRecord {
        id,
        reason: err.to_string(),
    })
}

impl HologramStore for JsonFileStore {
    fn load(&self) -> Result<Vec<Result<HologramRecord, HoloError>>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let values: Vec<Value> = serde_json::from_str(&text)
            .with_context(|| format!("{} is not a JSON array", self.path.display()))?;
        Ok(values.into_iter().map(parse_record).collect())
    }

    fn save(&self, records: &[HologramRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        let json = serde_json::to_string_pretty(records).context("Failed to encode records")?;
        let temp = self.temp_path();
        fs::write(&temp, json).with_context(|| format!("Failed to write {}", temp.display()))?;
        fs::rename(&temp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

/// Outcome of [`restore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Holograms registered.
    pub loaded: usize,
    /// Records skipped as malformed or duplicate.
    pub skipped: usize,
}

/// Load every record from `store` into `registry`, skipping bad ones.
pub fn restore(
    store: &dyn HologramStore,
    registry: &HologramRegistry,
    entities: &Arc<EntityIdAllocator>,
) -> Result<LoadReport> {
    let mut report = LoadReport::default();
    for entry in store.load()? {
        let restored = entry
            .and_then(|record| from_record(record, Arc::clone(entities)))
            .and_then(|hologram| registry.add(Arc::new(hologram)));
        match restored {
            Ok(()) => report.loaded += 1,
            Err(err) => {
                report.skipped += 1;
                warn!("Skipping stored hologram: {err}");
            }
        }
    }
    info!(loaded = report.loaded, skipped = report.skipped, "holograms restored");
    Ok(report)
}
