//! The call surface consumed by the command layer and connection hooks.

use crate::saver::SaveTrigger;
use crate::viewers::{ViewerDirectory, ViewerSnapshot, WorldDirectory};
use glam::DVec3;
use mdholo_core::{EntityIdAllocator, HologramId, ViewerId, WorldId};
use mdholo_hologram::{
    ApplyOp, Dispatcher, HoloError, Hologram, HologramInfo, HologramKind, HologramRegistry,
    LineContent, Placement, RankingConfig,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Holograms listed per `near` page.
pub const NEAR_PAGE_SIZE: usize = 10;

/// One `near` result.
#[derive(Debug, Clone, PartialEq)]
pub struct NearEntry {
    /// Hologram id.
    pub id: HologramId,
    /// Distance from the query position to the anchor.
    pub distance: f64,
}

/// Shared collaborators a service needs.
pub struct ServiceParts {
    /// Ground-truth directory.
    pub registry: Arc<HologramRegistry>,
    /// Queue into the apply context.
    pub dispatch: Dispatcher,
    /// Entity id source shared by every hologram.
    pub entities: Arc<EntityIdAllocator>,
    /// World resolution.
    pub worlds: Arc<dyn WorldDirectory>,
    /// Connected viewers.
    pub viewers: Arc<ViewerDirectory>,
    /// Debounced persistence.
    pub saves: SaveTrigger,
    /// Range for holograms created without one.
    pub default_range: f64,
}

/// Hologram editing and viewer hooks.
///
/// Validation errors come back synchronously; entity traffic is queued for
/// the apply context and never awaited.
pub struct HologramService {
    registry: Arc<HologramRegistry>,
    dispatch: Dispatcher,
    entities: Arc<EntityIdAllocator>,
    worlds: Arc<dyn WorldDirectory>,
    viewers: Arc<ViewerDirectory>,
    saves: SaveTrigger,
    default_range: f64,
}

impl HologramService {
    /// Assemble a service.
    pub fn new(parts: ServiceParts) -> Self {
        Self {
            registry: parts.registry,
            dispatch: parts.dispatch,
            entities: parts.entities,
            worlds: parts.worlds,
            viewers: parts.viewers,
            saves: parts.saves,
            default_range: parts.default_range,
        }
    }

    /// Registry this service edits.
    pub fn registry(&self) -> &Arc<HologramRegistry> {
        &self.registry
    }

    /// Connected viewers.
    pub fn viewers(&self) -> &Arc<ViewerDirectory> {
        &self.viewers
    }

    fn lookup(&self, id: &str) -> Result<Arc<Hologram>, HoloError> {
        let id = HologramId::parse(id).map_err(|_| HoloError::NotFound(id.to_string()))?;
        self.registry.get(&id)
    }

    fn require_world(&self, world: &WorldId) -> Result<(), HoloError> {
        if self.worlds.is_loaded(world) {
            Ok(())
        } else {
            Err(HoloError::WorldNotFound(world.to_string()))
        }
    }

    fn register(
        &self,
        id: &str,
        world: WorldId,
        position: DVec3,
        lines: Vec<LineContent>,
        kind: &HologramKind,
    ) -> Result<Arc<Hologram>, HoloError> {
        let id = HologramId::parse(id)?;
        kind.validate()?;
        if self.registry.contains(&id) {
            return Err(HoloError::AlreadyExists(id.to_string()));
        }
        self.require_world(&world)?;

        let placement = Placement::new(world, position, self.default_range);
        let hologram = Hologram::new(id, placement, lines, Arc::clone(&self.entities))?;
        let hologram = Arc::new(hologram.with_kind(kind));
        self.registry.add(Arc::clone(&hologram))?;
        self.saves.request();
        info!(id = %hologram.id(), kind = kind.label(), "hologram created");
        Ok(hologram)
    }

    /// Create a standard hologram with at least one initial line.
    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    pub fn create(
        &self,
        id: &str,
        world: WorldId,
        position: DVec3,
        lines: Vec<LineContent>,
    ) -> Result<Arc<Hologram>, HoloError> {
        self.register(id, world, position, lines, &HologramKind::Standard)
    }

    /// Create a hologram with a floating item above its top line.
    pub fn create_item(
        &self,
        id: &str,
        world: WorldId,
        position: DVec3,
        item_id: &str,
        lines: Vec<LineContent>,
    ) -> Result<Arc<Hologram>, HoloError> {
        let kind = HologramKind::Item {
            item_id: item_id.to_string(),
        };
        self.register(id, world, position, lines, &kind)
    }

    /// Create a ranking board. Its lines start as the empty-board rendering.
    pub fn create_ranking(
        &self,
        id: &str,
        world: WorldId,
        position: DVec3,
        config: RankingConfig,
    ) -> Result<Arc<Hologram>, HoloError> {
        let initial = config.render(&[]);
        self.register(id, world, position, initial, &HologramKind::Ranking(config))
    }

    /// Append a line. Returns its index.
    pub fn add_line(&self, id: &str, content: LineContent) -> Result<usize, HoloError> {
        let index = self.lookup(id)?.add_line(content, &self.dispatch)?;
        self.saves.request();
        Ok(index)
    }

    /// Insert a line at `index`.
    pub fn insert_line(&self, id: &str, index: usize, content: LineContent) -> Result<(), HoloError> {
        self.lookup(id)?.insert_line(index, content, &self.dispatch)?;
        self.saves.request();
        Ok(())
    }

    /// Replace the content of line `index`.
    pub fn set_line(&self, id: &str, index: usize, content: LineContent) -> Result<(), HoloError> {
        self.lookup(id)?.set_line(index, content, &self.dispatch)?;
        self.saves.request();
        Ok(())
    }

    /// Remove line `index`. Fails on the last remaining line.
    pub fn remove_line(&self, id: &str, index: usize) -> Result<LineContent, HoloError> {
        let removed = self.lookup(id)?.remove_line(index, &self.dispatch)?;
        self.saves.request();
        Ok(removed)
    }

    /// Replace every line at once.
    pub fn replace_lines(&self, id: &str, contents: Vec<LineContent>) -> Result<(), HoloError> {
        self.lookup(id)?.replace_lines(contents, &self.dispatch)?;
        self.saves.request();
        Ok(())
    }

    /// Move within the current world.
    pub fn move_to(&self, id: &str, position: DVec3) -> Result<(), HoloError> {
        let hologram = self.lookup(id)?;
        let world = hologram.placement().world;
        if let Err(err) = self.require_world(&world) {
            warn!(id, %world, "move ignored: world is not loaded");
            return Err(err);
        }
        hologram.relocate(None, position, &self.dispatch)?;
        self.saves.request();
        Ok(())
    }

    /// Move to another world.
    pub fn teleport(&self, id: &str, world: WorldId, position: DVec3) -> Result<(), HoloError> {
        let hologram = self.lookup(id)?;
        if let Err(err) = self.require_world(&world) {
            warn!(id, %world, "teleport ignored: world is not loaded");
            return Err(err);
        }
        hologram.relocate(Some(world), position, &self.dispatch)?;
        self.saves.request();
        Ok(())
    }

    /// Copy `source` to `new_id` at `position`, in `world` or the source's own world.
    pub fn copy(
        &self,
        source: &str,
        new_id: &str,
        world: Option<WorldId>,
        position: DVec3,
    ) -> Result<Arc<Hologram>, HoloError> {
        let original = self.lookup(source)?;
        let new_id = HologramId::parse(new_id)?;
        if self.registry.contains(&new_id) {
            return Err(HoloError::AlreadyExists(new_id.to_string()));
        }

        let mut placement = original.placement();
        if let Some(world) = world {
            placement.world = world;
        }
        self.require_world(&placement.world)?;
        placement.anchor = position;

        let copy = Arc::new(original.duplicate(new_id, placement)?);
        self.registry.add(Arc::clone(&copy))?;
        self.saves.request();
        info!(from = %original.id(), to = %copy.id(), "hologram copied");
        Ok(copy)
    }

    /// Despawn everywhere and forget the hologram.
    pub fn delete(&self, id: &str) -> Result<(), HoloError> {
        let id = HologramId::parse(id).map_err(|_| HoloError::NotFound(id.to_string()))?;
        self.registry.delete(&id, &self.dispatch)?;
        self.saves.request();
        Ok(())
    }

    /// Every id, sorted case-insensitively.
    pub fn list(&self) -> Vec<HologramId> {
        self.registry.ids()
    }

    /// Holograms in `world` by ascending distance from `position`.
    ///
    /// Pages start at 1; a page past the end is empty.
    pub fn near(&self, world: &WorldId, position: DVec3, page: usize) -> Vec<NearEntry> {
        let mut entries: Vec<NearEntry> = self
            .registry
            .all()
            .into_iter()
            .filter_map(|hologram| {
                let placement = hologram.placement();
                (&placement.world == world).then(|| NearEntry {
                    id: hologram.id().clone(),
                    distance: placement.anchor.distance(position),
                })
            })
            .collect();
        entries.sort_by(|a, b| a.distance.total_cmp(&b.distance).then_with(|| a.id.cmp(&b.id)));

        let skip = page.max(1).saturating_sub(1).saturating_mul(NEAR_PAGE_SIZE);
        entries.into_iter().skip(skip).take(NEAR_PAGE_SIZE).collect()
    }

    /// Snapshot of one hologram.
    pub fn info(&self, id: &str) -> Result<HologramInfo, HoloError> {
        Ok(self.lookup(id)?.info())
    }

    /// Despawn and forget every hologram.
    pub fn clear(&self) {
        self.registry.clear(&self.dispatch);
        self.saves.request();
    }

    /// Connection hook: a viewer arrived. The next pass shows what is in range.
    pub fn on_viewer_join(&self, viewer: ViewerSnapshot) {
        let id = viewer.id;
        self.viewers.upsert(viewer);
        self.dispatch.dispatch(ApplyOp::ViewerJoined(id));
        info!(viewer = %id, "viewer joined");
    }

    /// Connection hook: a viewer is gone. Nothing is sent to it.
    pub fn on_viewer_leave(&self, viewer: ViewerId) {
        self.viewers.remove(viewer);
        self.dispatch.dispatch(ApplyOp::ViewerLeft(viewer));
        info!(%viewer, "viewer left");
    }

    /// Connection hook: a viewer moved.
    pub fn update_viewer(&self, viewer: ViewerId, world: WorldId, position: DVec3) -> bool {
        self.viewers.update(viewer, world, position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewers::LoadedWorlds;
    use mdholo_hologram::{from_record, to_record, ApplyContext};
    use mdholo_testkit::RecordingSink;

    fn service() -> (HologramService, ApplyContext, Arc<RecordingSink>) {
        let registry = Arc::new(HologramRegistry::new());
        let sink = Arc::new(RecordingSink::new());
        let (ctx, dispatch) = ApplyContext::new(Arc::clone(&registry), sink.clone());
        let service = HologramService::new(ServiceParts {
            registry,
            dispatch,
            entities: Arc::new(EntityIdAllocator::default()),
            worlds: Arc::new(LoadedWorlds::new([WorldId::new("w"), WorldId::new("nether")])),
            viewers: Arc::new(ViewerDirectory::new()),
            saves: SaveTrigger::disabled(),
            default_range: 10.0,
        });
        (service, ctx, sink)
    }

    fn texts(lines: &[&str]) -> Vec<LineContent> {
        lines.iter().map(|s| LineContent::text(*s)).collect()
    }

    #[test]
    fn insert_remove_scenario() {
        let (svc, _ctx, _sink) = service();
        svc.create("sign", WorldId::new("w"), DVec3::new(0.0, 64.0, 0.0), texts(&["A"]))
            .unwrap();

        svc.insert_line("sign", 0, LineContent::text("B")).unwrap();
        assert_eq!(svc.info("sign").unwrap().lines, vec!["B", "A"]);

        svc.remove_line("sign", 0).unwrap();
        assert_eq!(svc.info("sign").unwrap().lines, vec!["A"]);

        assert_eq!(
            svc.remove_line("sign", 0),
            Err(HoloError::LastLineViolation("sign".into()))
        );
        assert_eq!(svc.info("sign").unwrap().lines, vec!["A"]);
    }

    #[test]
    fn ids_are_case_insensitive() {
        let (svc, _ctx, _sink) = service();
        svc.create("Lobby", WorldId::new("w"), DVec3::ZERO, texts(&["hi"]))
            .unwrap();
        assert!(matches!(
            svc.create("LOBBY", WorldId::new("w"), DVec3::ZERO, texts(&["x"])),
            Err(HoloError::AlreadyExists(_))
        ));
        assert_eq!(svc.info("lobby").unwrap().id.as_str(), "Lobby");
    }

    #[test]
    fn validation_errors_are_returned() {
        let (svc, _ctx, _sink) = service();
        assert!(matches!(svc.add_line("ghost", LineContent::text("x")), Err(HoloError::NotFound(_))));
        assert_eq!(
            svc.create("empty", WorldId::new("w"), DVec3::ZERO, Vec::new()).err(),
            Some(HoloError::EmptyLines)
        );
        svc.create("a", WorldId::new("w"), DVec3::ZERO, texts(&["x"])).unwrap();
        assert_eq!(
            svc.set_line("a", 3, LineContent::text("y")),
            Err(HoloError::InvalidIndex { index: 3, len: 1 })
        );
        assert_eq!(
            svc.insert_line("a", 2, LineContent::text("y")),
            Err(HoloError::InvalidIndex { index: 2, len: 1 })
        );
    }

    #[test]
    fn teleport_to_missing_world_is_a_noop() {
        let (svc, _ctx, _sink) = service();
        svc.create("a", WorldId::new("w"), DVec3::ZERO, texts(&["x"])).unwrap();
        assert_eq!(
            svc.teleport("a", WorldId::new("void"), DVec3::ONE),
            Err(HoloError::WorldNotFound("void".into()))
        );
        let info = svc.info("a").unwrap();
        assert_eq!(info.placement.world, WorldId::new("w"));
        assert_eq!(info.placement.anchor, DVec3::ZERO);

        svc.teleport("a", WorldId::new("nether"), DVec3::ONE).unwrap();
        assert_eq!(svc.info("a").unwrap().placement.world, WorldId::new("nether"));
    }

    #[test]
    fn copy_is_independent() {
        let (svc, _ctx, _sink) = service();
        svc.create("a", WorldId::new("w"), DVec3::ZERO, texts(&["x", "y"])).unwrap();
        svc.copy("a", "b", None, DVec3::new(5.0, 70.0, 5.0)).unwrap();
        assert!(matches!(
            svc.copy("a", "B", None, DVec3::ZERO),
            Err(HoloError::AlreadyExists(_))
        ));

        svc.set_line("b", 0, LineContent::text("changed")).unwrap();
        assert_eq!(svc.info("a").unwrap().lines, vec!["x", "y"]);
        let b = svc.info("b").unwrap();
        assert_eq!(b.lines, vec!["changed", "y"]);
        assert_eq!(b.placement.anchor, DVec3::new(5.0, 70.0, 5.0));
    }

    #[test]
    fn near_sorts_and_pages() {
        let (svc, _ctx, _sink) = service();
        for i in 0..12 {
            svc.create(
                &format!("h{i}"),
                WorldId::new("w"),
                DVec3::new(i as f64, 0.0, 0.0),
                texts(&["x"]),
            )
            .unwrap();
        }
        svc.create("far", WorldId::new("nether"), DVec3::ZERO, texts(&["x"]))
            .unwrap();

        let first = svc.near(&WorldId::new("w"), DVec3::new(-1.0, 0.0, 0.0), 1);
        assert_eq!(first.len(), NEAR_PAGE_SIZE);
        assert_eq!(first[0].id.as_str(), "h0");
        assert_eq!(first[0].distance, 1.0);
        assert!(first.windows(2).all(|w| w[0].distance <= w[1].distance));

        let second = svc.near(&WorldId::new("w"), DVec3::new(-1.0, 0.0, 0.0), 2);
        assert_eq!(second.len(), 2);
        assert!(svc.near(&WorldId::new("w"), DVec3::ZERO, 3).is_empty());
    }

    #[test]
    fn delete_despawns_for_viewers() {
        let (svc, mut ctx, sink) = service();
        let hologram = svc
            .create("a", WorldId::new("w"), DVec3::ZERO, texts(&["x", "y"]))
            .unwrap();
        let v = ViewerId(1);
        svc.on_viewer_join(ViewerSnapshot::new(v, WorldId::new("w"), DVec3::ONE));
        ctx.run_pending();
        ctx.apply(ApplyOp::Show {
            hologram,
            viewer: v,
        });
        assert_eq!(sink.spawned(v).len(), 2);

        svc.delete("a").unwrap();
        ctx.run_pending();
        assert!(sink.spawned(v).is_empty());
        assert!(svc.list().is_empty());
        assert!(matches!(svc.delete("a"), Err(HoloError::NotFound(_))));
    }

    #[test]
    fn leave_clears_without_messages() {
        let (svc, mut ctx, sink) = service();
        let hologram = svc
            .create("a", WorldId::new("w"), DVec3::ZERO, texts(&["x"]))
            .unwrap();
        let v = ViewerId(7);
        svc.on_viewer_join(ViewerSnapshot::new(v, WorldId::new("w"), DVec3::ONE));
        ctx.run_pending();
        ctx.apply(ApplyOp::Show {
            hologram: Arc::clone(&hologram),
            viewer: v,
        });
        let before = sink.count_for(v);

        svc.on_viewer_leave(v);
        ctx.run_pending();
        assert!(!hologram.is_visible_to(v));
        assert_eq!(sink.count_for(v), before);
        assert!(svc.viewers().is_empty());
    }

    #[test]
    fn boards_created_here_load_back_from_the_store() {
        let (svc, _ctx, _sink) = service();
        let mut config = RankingConfig::new("kills", 3);
        config.update_interval = std::time::Duration::from_millis(1500);
        let board = svc
            .create_ranking("top", WorldId::new("w"), DVec3::ZERO, config.clone())
            .unwrap();

        let restored = from_record(to_record(&board), Arc::new(EntityIdAllocator::default()))
            .expect("stored board loads");
        assert_eq!(restored.kind(), HologramKind::Ranking(config));
        assert_eq!(restored.texts(), board.texts());
    }

    #[test]
    fn unstorable_variants_are_rejected_at_create() {
        let (svc, _ctx, _sink) = service();
        let mut no_interval = RankingConfig::new("kills", 3);
        no_interval.update_interval = std::time::Duration::ZERO;

        for config in [RankingConfig::new("kills", 0), no_interval] {
            assert!(matches!(
                svc.create_ranking("top", WorldId::new("w"), DVec3::ZERO, config),
                Err(HoloError::InvalidKind { kind: "ranking", .. })
            ));
        }
        assert!(matches!(
            svc.create_item("gem", WorldId::new("w"), DVec3::ZERO, " ", texts(&["x"])),
            Err(HoloError::InvalidKind { kind: "item", .. })
        ));
        assert!(svc.list().is_empty());
    }
}
