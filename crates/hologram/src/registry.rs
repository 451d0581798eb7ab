//! Directory of every live hologram, keyed by case-insensitive id.
//!
//! Readers get `Arc` snapshots, so iteration never observes a half-applied
//! add or remove and never holds the directory lock while working.

use crate::dispatch::{ApplyOp, Dispatcher};
use crate::error::HoloError;
use crate::hologram::Hologram;
use mdholo_core::HologramId;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Concurrent hologram directory.
#[derive(Default)]
pub struct HologramRegistry {
    holograms: RwLock<BTreeMap<HologramId, Arc<Hologram>>>,
}

impl HologramRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hologram. Fails with [`HoloError::AlreadyExists`] on an id collision.
    pub fn add(&self, hologram: Arc<Hologram>) -> Result<(), HoloError> {
        let mut holograms = self.holograms.write();
        let id = hologram.id().clone();
        if holograms.contains_key(&id) {
            return Err(HoloError::AlreadyExists(id.to_string()));
        }
        holograms.insert(id, hologram);
        Ok(())
    }

    /// Unregister a hologram. Removing an absent id is a no-op.
    pub fn remove(&self, id: &HologramId) -> Option<Arc<Hologram>> {
        self.holograms.write().remove(id)
    }

    /// Look up a hologram.
    pub fn get(&self, id: &HologramId) -> Result<Arc<Hologram>, HoloError> {
        self.holograms
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| HoloError::NotFound(id.to_string()))
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &HologramId) -> bool {
        self.holograms.read().contains_key(id)
    }

    /// Snapshot of every hologram, ordered by id.
    pub fn all(&self) -> Vec<Arc<Hologram>> {
        self.holograms.read().values().cloned().collect()
    }

    /// Snapshot of every id, ordered.
    pub fn ids(&self) -> Vec<HologramId> {
        self.holograms.read().keys().cloned().collect()
    }

    /// Number of holograms.
    pub fn len(&self) -> usize {
        self.holograms.read().len()
    }

    /// True when no hologram is registered.
    pub fn is_empty(&self) -> bool {
        self.holograms.read().is_empty()
    }

    /// Retire a hologram, despawn it for every viewer, and unregister it.
    pub fn delete(&self, id: &HologramId, dispatch: &Dispatcher) -> Result<(), HoloError> {
        let hologram = self.get(id)?;
        hologram.retire();
        dispatch.dispatch(ApplyOp::HideAll {
            hologram: Arc::clone(&hologram),
        });
        self.remove(id);
        info!(%id, "hologram deleted");
        Ok(())
    }

    /// Despawn every hologram for every viewer, then empty the directory.
    pub fn clear(&self, dispatch: &Dispatcher) {
        let drained = std::mem::take(&mut *self.holograms.write());
        let count = drained.len();
        for hologram in drained.into_values() {
            hologram.retire();
            dispatch.dispatch(ApplyOp::HideAll { hologram });
        }
        info!(count, "registry cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::ApplyContext;
    use crate::hologram::Placement;
    use crate::line::LineContent;
    use glam::DVec3;
    use mdholo_core::{EntityIdAllocator, ViewerId, WorldId};
    use mdholo_testkit::RecordingSink;

    fn hologram(id: &str) -> Arc<Hologram> {
        Arc::new(
            Hologram::new(
                HologramId::parse(id).unwrap(),
                Placement::new(WorldId::new("w"), DVec3::ZERO, 8.0),
                vec![LineContent::text(id)],
                Arc::new(EntityIdAllocator::default()),
            )
            .unwrap(),
        )
    }

    #[test]
    fn add_get_remove() {
        let registry = HologramRegistry::new();
        registry.add(hologram("Alpha")).unwrap();
        assert!(registry.get(&HologramId::parse("alpha").unwrap()).is_ok());
        assert_eq!(
            registry.add(hologram("ALPHA")).unwrap_err(),
            HoloError::AlreadyExists("ALPHA".into())
        );

        let id = HologramId::parse("alpha").unwrap();
        assert!(registry.remove(&id).is_some());
        assert!(registry.remove(&id).is_none());
        assert_eq!(
            registry.get(&id).unwrap_err(),
            HoloError::NotFound("alpha".into())
        );
    }

    #[test]
    fn snapshots_are_ordered_and_detached() {
        let registry = HologramRegistry::new();
        for id in ["c", "a", "b"] {
            registry.add(hologram(id)).unwrap();
        }
        let snapshot = registry.all();
        registry.remove(&HologramId::parse("a").unwrap());

        let ids: Vec<_> = snapshot.iter().map(|h| h.id().to_string()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn clear_despawns_for_every_viewer() {
        let registry = Arc::new(HologramRegistry::new());
        let sink = Arc::new(RecordingSink::new());
        let (mut ctx, dispatch) = ApplyContext::new(registry.clone(), sink.clone());
        let a = hologram("a");
        let b = hologram("b");
        registry.add(a.clone()).unwrap();
        registry.add(b.clone()).unwrap();

        for viewer in [ViewerId(1), ViewerId(2)] {
            dispatch.dispatch(ApplyOp::ViewerJoined(viewer));
            for h in [&a, &b] {
                dispatch.dispatch(ApplyOp::Show {
                    hologram: h.clone(),
                    viewer,
                });
            }
        }
        ctx.run_pending();

        registry.clear(&dispatch);
        ctx.run_pending();

        assert!(registry.is_empty());
        for viewer in [ViewerId(1), ViewerId(2)] {
            assert!(sink.spawned(viewer).is_empty());
        }
        assert!(a.is_retired() && b.is_retired());
    }

    #[test]
    fn delete_unknown_is_not_found() {
        let registry = HologramRegistry::new();
        let sink = Arc::new(RecordingSink::new());
        let (_ctx, dispatch) = ApplyContext::new(Arc::new(HologramRegistry::new()), sink);
        assert!(matches!(
            registry.delete(&HologramId::parse("ghost").unwrap(), &dispatch),
            Err(HoloError::NotFound(_))
        ));
    }
}
