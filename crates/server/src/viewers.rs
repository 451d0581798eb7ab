//! Connected viewers and loaded worlds, as seen by the scheduler.
//!
//! Both are owned by the connection layer; the core only reads snapshots.

use dashmap::DashMap;
use glam::DVec3;
use mdholo_core::{ViewerId, WorldId};
use parking_lot::RwLock;
use std::collections::BTreeSet;

/// Where a viewer was at poll time.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerSnapshot {
    /// Viewer identity.
    pub id: ViewerId,
    /// World the viewer is in.
    pub world: WorldId,
    /// Position in that world.
    pub position: DVec3,
}

impl ViewerSnapshot {
    /// Bundle a snapshot.
    pub fn new(id: ViewerId, world: WorldId, position: DVec3) -> Self {
        Self {
            id,
            world,
            position,
        }
    }
}

/// Connected viewers and their latest positions.
#[derive(Default)]
pub struct ViewerDirectory {
    viewers: DashMap<ViewerId, ViewerSnapshot>,
}

impl ViewerDirectory {
    /// Empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh a viewer.
    pub fn upsert(&self, snapshot: ViewerSnapshot) {
        self.viewers.insert(snapshot.id, snapshot);
    }

    /// Update a connected viewer's position. Unknown viewers are ignored.
    pub fn update(&self, id: ViewerId, world: WorldId, position: DVec3) -> bool {
        match self.viewers.get_mut(&id) {
            Some(mut entry) => {
                entry.world = world;
                entry.position = position;
                true
            }
            None => false,
        }
    }

    /// Drop a viewer.
    pub fn remove(&self, id: ViewerId) -> Option<ViewerSnapshot> {
        self.viewers.remove(&id).map(|(_, snapshot)| snapshot)
    }

    /// Latest snapshot of one viewer.
    pub fn get(&self, id: ViewerId) -> Option<ViewerSnapshot> {
        self.viewers.get(&id).map(|entry| entry.value().clone())
    }

    /// Every connected viewer, ordered by id.
    pub fn snapshot(&self) -> Vec<ViewerSnapshot> {
        let mut all: Vec<_> = self
            .viewers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        all.sort_by_key(|snapshot| snapshot.id);
        all
    }

    /// Number of connected viewers.
    pub fn len(&self) -> usize {
        self.viewers.len()
    }

    /// True when nobody is connected.
    pub fn is_empty(&self) -> bool {
        self.viewers.is_empty()
    }
}

/// World name resolution, owned by the host.
pub trait WorldDirectory: Send + Sync {
    /// Whether `world` is currently loaded.
    fn is_loaded(&self, world: &WorldId) -> bool;
}

/// In-memory set of loaded worlds.
#[derive(Default)]
pub struct LoadedWorlds {
    worlds: RwLock<BTreeSet<WorldId>>,
}

impl LoadedWorlds {
    /// Directory with `worlds` loaded.
    pub fn new<I>(worlds: I) -> Self
    where
        I: IntoIterator<Item = WorldId>,
    {
        Self {
            worlds: RwLock::new(worlds.into_iter().collect()),
        }
    }

    /// Mark a world loaded.
    pub fn load(&self, world: WorldId) {
        self.worlds.write().insert(world);
    }

    /// Mark a world unloaded.
    pub fn unload(&self, world: &WorldId) {
        self.worlds.write().remove(world);
    }
}

impl WorldDirectory for LoadedWorlds {
    fn is_loaded(&self, world: &WorldId) -> bool {
        self.worlds.read().contains(world)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_tracks_positions() {
        let dir = ViewerDirectory::new();
        let w = WorldId::new("w");
        dir.upsert(ViewerSnapshot::new(ViewerId(2), w.clone(), DVec3::ZERO));
        dir.upsert(ViewerSnapshot::new(ViewerId(1), w.clone(), DVec3::ONE));

        assert!(dir.update(ViewerId(2), w.clone(), DVec3::new(5.0, 0.0, 0.0)));
        assert!(!dir.update(ViewerId(9), w.clone(), DVec3::ZERO));

        let ids: Vec<_> = dir.snapshot().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![ViewerId(1), ViewerId(2)]);
        assert_eq!(
            dir.get(ViewerId(2)).map(|s| s.position),
            Some(DVec3::new(5.0, 0.0, 0.0))
        );

        dir.remove(ViewerId(1));
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn worlds_load_and_unload() {
        let worlds = LoadedWorlds::new([WorldId::new("w")]);
        assert!(worlds.is_loaded(&WorldId::new("w")));
        worlds.unload(&WorldId::new("w"));
        assert!(!worlds.is_loaded(&WorldId::new("w")));
        worlds.load(WorldId::new("end"));
        assert!(worlds.is_loaded(&WorldId::new("end")));
    }
}
