//! Hologram model and the line-mutation algebra.
//!
//! Every structural edit takes the layout write lock, mutates the line stack,
//! restacks offsets, and enqueues the matching [`ApplyOp`]s before releasing
//! the lock, so readers see either the old or the new stack and the apply
//! context sees deltas in mutation order.

use crate::decoration::{Decoration, ItemDecoration};
use crate::dispatch::{ApplyOp, Dispatcher};
use crate::error::HoloError;
use crate::line::{Line, LineContent};
use crate::ranking::{ContentProvider, DataSources, RankingBoard, RankingConfig};
use glam::DVec3;
use mdholo_core::{line_offset, EntityIdAllocator, HologramId, ViewerId, WorldId};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Where a hologram lives and how far it can be seen.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    /// World the hologram is in.
    pub world: WorldId,
    /// Position of the top line.
    pub anchor: DVec3,
    /// Visibility radius in blocks.
    pub range: f64,
}

impl Placement {
    /// Bundle a placement.
    pub fn new(world: WorldId, anchor: DVec3, range: f64) -> Self {
        Self {
            world,
            anchor,
            range,
        }
    }

    /// Reject non-finite anchors and non-positive ranges.
    pub fn validate(&self) -> Result<(), HoloError> {
        if !self.anchor.is_finite() {
            return Err(HoloError::InvalidPlacement(format!(
                "anchor {} is not finite",
                self.anchor
            )));
        }
        if !(self.range.is_finite() && self.range > 0.0) {
            return Err(HoloError::InvalidPlacement(format!(
                "range {} must be a positive number",
                self.range
            )));
        }
        Ok(())
    }

    /// Visibility condition for a viewer standing at `pos` in `world`.
    pub fn contains(&self, world: &WorldId, pos: DVec3) -> bool {
        &self.world == world && pos.distance_squared(self.anchor) <= self.range * self.range
    }
}

/// Variant payload, as persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum HologramKind {
    /// Lines only.
    Standard,
    /// Lines plus a floating item.
    Item {
        /// Item identifier.
        item_id: String,
    },
    /// Lines rebuilt from a ranked objective.
    Ranking(RankingConfig),
}

impl HologramKind {
    /// Short label used in records and listings.
    pub fn label(&self) -> &'static str {
        match self {
            HologramKind::Standard => "standard",
            HologramKind::Item { .. } => "item",
            HologramKind::Ranking(_) => "ranking",
        }
    }

    /// Reject settings the store would refuse to load back.
    pub fn validate(&self) -> Result<(), HoloError> {
        match self {
            HologramKind::Standard => Ok(()),
            HologramKind::Item { item_id } if item_id.trim().is_empty() => {
                Err(HoloError::InvalidKind {
                    kind: self.label(),
                    reason: "itemId is empty".into(),
                })
            }
            HologramKind::Item { .. } => Ok(()),
            HologramKind::Ranking(config) => config.validate(),
        }
    }
}

/// Point-in-time description returned by `info`.
#[derive(Debug, Clone, PartialEq)]
pub struct HologramInfo {
    /// Hologram id.
    pub id: HologramId,
    /// Placement at snapshot time.
    pub placement: Placement,
    /// Variant.
    pub kind: HologramKind,
    /// Text currently shown on each line.
    pub lines: Vec<String>,
    /// Viewers currently perceiving it.
    pub viewers: usize,
}

struct Layout {
    placement: Placement,
    lines: Vec<Line>,
}

impl Layout {
    /// Recompute offsets for lines at `from` and below.
    fn restack(&mut self, from: usize) {
        let anchor_y = self.placement.anchor.y;
        for (index, line) in self.lines.iter_mut().enumerate().skip(from) {
            line.set_offset(line_offset(anchor_y, index));
        }
    }
}

/// A multi-line floating label anchored in a world.
pub struct Hologram {
    id: HologramId,
    entities: Arc<EntityIdAllocator>,
    layout: RwLock<Layout>,
    // Written only by the apply context.
    viewers: RwLock<BTreeSet<ViewerId>>,
    decoration: Option<Box<dyn Decoration>>,
    provider: Option<Mutex<Box<dyn ContentProvider>>>,
    retired: AtomicBool,
}

impl fmt::Debug for Hologram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hologram")
            .field("id", &self.id)
            .field("lines", &self.line_count())
            .field("viewers", &self.viewer_count())
            .finish()
    }
}

impl Hologram {
    /// Build a standard hologram. Needs at least one line.
    pub fn new(
        id: HologramId,
        placement: Placement,
        contents: Vec<LineContent>,
        entities: Arc<EntityIdAllocator>,
    ) -> Result<Self, HoloError> {
        placement.validate()?;
        if contents.is_empty() {
            return Err(HoloError::EmptyLines);
        }
        for content in &contents {
            content.validate()?;
        }

        let anchor_y = placement.anchor.y;
        let lines = contents
            .into_iter()
            .enumerate()
            .map(|(index, content)| Line::new(content, line_offset(anchor_y, index), entities.allocate()))
            .collect();

        Ok(Self {
            id,
            entities,
            layout: RwLock::new(Layout { placement, lines }),
            viewers: RwLock::new(BTreeSet::new()),
            decoration: None,
            provider: None,
            retired: AtomicBool::new(false),
        })
    }

    /// Attach the payload described by `kind`.
    pub fn with_kind(self, kind: &HologramKind) -> Self {
        match kind {
            HologramKind::Standard => self,
            HologramKind::Item { item_id } => {
                let entity = self.entities.allocate();
                self.with_decoration(Box::new(ItemDecoration::new(item_id.clone(), entity)))
            }
            HologramKind::Ranking(config) => {
                self.with_provider(Box::new(RankingBoard::new(config.clone())))
            }
        }
    }

    /// Attach an extra visual spawned and moved in lock-step with the lines.
    pub fn with_decoration(mut self, decoration: Box<dyn Decoration>) -> Self {
        self.decoration = Some(decoration);
        self
    }

    /// Attach a provider that rebuilds the line list on its own cadence.
    pub fn with_provider(mut self, mut provider: Box<dyn ContentProvider>) -> Self {
        provider.prime(&self.contents());
        self.provider = Some(Mutex::new(provider));
        self
    }

    /// Hologram id.
    pub fn id(&self) -> &HologramId {
        &self.id
    }

    /// Current placement.
    pub fn placement(&self) -> Placement {
        self.layout.read().placement.clone()
    }

    /// Number of lines.
    pub fn line_count(&self) -> usize {
        self.layout.read().lines.len()
    }

    /// Ordered line contents.
    pub fn contents(&self) -> Vec<LineContent> {
        self.layout
            .read()
            .lines
            .iter()
            .map(|line| line.content().clone())
            .collect()
    }

    /// Text currently shown on each line.
    pub fn texts(&self) -> Vec<String> {
        self.layout
            .read()
            .lines
            .iter()
            .map(|line| line.current_text().to_string())
            .collect()
    }

    /// Absolute vertical position of each line.
    pub fn offsets(&self) -> Vec<f64> {
        self.layout.read().lines.iter().map(Line::offset).collect()
    }

    /// Variant payload.
    pub fn kind(&self) -> HologramKind {
        if let Some(decoration) = &self.decoration {
            return decoration.kind();
        }
        if let Some(provider) = &self.provider {
            return provider.lock().kind();
        }
        HologramKind::Standard
    }

    /// Attached decoration, if any.
    pub fn decoration(&self) -> Option<&dyn Decoration> {
        self.decoration.as_deref()
    }

    /// Snapshot for the `info` command.
    pub fn info(&self) -> HologramInfo {
        let (placement, lines) = {
            let layout = self.layout.read();
            (
                layout.placement.clone(),
                layout
                    .lines
                    .iter()
                    .map(|line| line.current_text().to_string())
                    .collect(),
            )
        };
        HologramInfo {
            id: self.id.clone(),
            placement,
            kind: self.kind(),
            lines,
            viewers: self.viewer_count(),
        }
    }

    /// Viewers currently perceiving this hologram.
    pub fn viewers(&self) -> Vec<ViewerId> {
        self.viewers.read().iter().copied().collect()
    }

    /// Whether `viewer` currently perceives this hologram.
    pub fn is_visible_to(&self, viewer: ViewerId) -> bool {
        self.viewers.read().contains(&viewer)
    }

    /// Number of current viewers.
    pub fn viewer_count(&self) -> usize {
        self.viewers.read().len()
    }

    /// True once deleted; the apply context never spawns a retired hologram.
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }

    pub(crate) fn retire(&self) {
        self.retired.store(true, Ordering::SeqCst);
    }

    pub(crate) fn read_layout<R>(&self, f: impl FnOnce(&Placement, &[Line]) -> R) -> R {
        let layout = self.layout.read();
        f(&layout.placement, &layout.lines)
    }

    pub(crate) fn mark_visible(&self, viewer: ViewerId) -> bool {
        self.viewers.write().insert(viewer)
    }

    pub(crate) fn mark_hidden(&self, viewer: ViewerId) -> bool {
        self.viewers.write().remove(&viewer)
    }

    fn ensure_live(&self) -> Result<(), HoloError> {
        if self.is_retired() {
            return Err(HoloError::NotFound(self.id.to_string()));
        }
        Ok(())
    }

    /// Append a line below the stack. Returns its index.
    pub fn add_line(
        self: &Arc<Self>,
        content: LineContent,
        dispatch: &Dispatcher,
    ) -> Result<usize, HoloError> {
        self.ensure_live()?;
        content.validate()?;

        let mut layout = self.layout.write();
        let index = layout.lines.len();
        let offset = line_offset(layout.placement.anchor.y, index);
        let entity = self.entities.allocate();
        layout.lines.push(Line::new(content, offset, entity));
        dispatch.dispatch(ApplyOp::SpawnLine {
            hologram: Arc::clone(self),
            entity,
        });
        debug!(id = %self.id, index, "line added");
        Ok(index)
    }

    /// Insert a line at `index`, shifting the lines below it down one slot.
    pub fn insert_line(
        self: &Arc<Self>,
        index: usize,
        content: LineContent,
        dispatch: &Dispatcher,
    ) -> Result<(), HoloError> {
        self.ensure_live()?;
        content.validate()?;

        let mut layout = self.layout.write();
        let len = layout.lines.len();
        if index > len {
            return Err(HoloError::InvalidIndex { index, len });
        }

        let offset = line_offset(layout.placement.anchor.y, index);
        let entity = self.entities.allocate();
        layout.lines.insert(index, Line::new(content, offset, entity));
        layout.restack(index + 1);

        dispatch.dispatch(ApplyOp::SpawnLine {
            hologram: Arc::clone(self),
            entity,
        });
        if index < len {
            dispatch.dispatch(ApplyOp::Reposition {
                hologram: Arc::clone(self),
                from: index + 1,
            });
        }
        debug!(id = %self.id, index, "line inserted");
        Ok(())
    }

    /// Remove the line at `index`, shifting the lines below it up one slot.
    ///
    /// Fails with [`HoloError::LastLineViolation`] on a single-line hologram.
    pub fn remove_line(
        self: &Arc<Self>,
        index: usize,
        dispatch: &Dispatcher,
    ) -> Result<LineContent, HoloError> {
        self.ensure_live()?;

        let mut layout = self.layout.write();
        let len = layout.lines.len();
        if index >= len {
            return Err(HoloError::InvalidIndex { index, len });
        }
        if len == 1 {
            return Err(HoloError::LastLineViolation(self.id.to_string()));
        }

        let removed = layout.lines.remove(index);
        layout.restack(index);

        dispatch.dispatch(ApplyOp::DespawnEntity {
            entity: removed.entity(),
        });
        if index < layout.lines.len() {
            dispatch.dispatch(ApplyOp::Reposition {
                hologram: Arc::clone(self),
                from: index,
            });
        }
        debug!(id = %self.id, index, "line removed");
        Ok(removed.content().clone())
    }

    /// Replace the content of the line at `index` in place.
    pub fn set_line(
        self: &Arc<Self>,
        index: usize,
        content: LineContent,
        dispatch: &Dispatcher,
    ) -> Result<(), HoloError> {
        self.ensure_live()?;
        content.validate()?;

        let mut layout = self.layout.write();
        let len = layout.lines.len();
        let line = layout
            .lines
            .get_mut(index)
            .ok_or(HoloError::InvalidIndex { index, len })?;
        line.set_content(content);
        dispatch.dispatch(ApplyOp::UpdateText {
            hologram: Arc::clone(self),
            entity: line.entity(),
        });
        Ok(())
    }

    /// Atomically replace the whole line list.
    ///
    /// Lines present before and after keep their entities and only get a
    /// content update when their value changed; extra lines are spawned and
    /// surplus lines despawned.
    pub fn replace_lines(
        self: &Arc<Self>,
        contents: Vec<LineContent>,
        dispatch: &Dispatcher,
    ) -> Result<(), HoloError> {
        self.ensure_live()?;
        if contents.is_empty() {
            return Err(HoloError::EmptyLines);
        }
        for content in &contents {
            content.validate()?;
        }

        let mut layout = self.layout.write();
        let anchor_y = layout.placement.anchor.y;
        let new_len = contents.len();
        let old_len = layout.lines.len();

        for (index, content) in contents.into_iter().enumerate() {
            if let Some(line) = layout.lines.get_mut(index) {
                if line.content() != &content {
                    line.set_content(content);
                    dispatch.dispatch(ApplyOp::UpdateText {
                        hologram: Arc::clone(self),
                        entity: line.entity(),
                    });
                }
            } else {
                let entity = self.entities.allocate();
                layout
                    .lines
                    .push(Line::new(content, line_offset(anchor_y, index), entity));
                dispatch.dispatch(ApplyOp::SpawnLine {
                    hologram: Arc::clone(self),
                    entity,
                });
            }
        }
        if new_len < old_len {
            for line in layout.lines.drain(new_len..) {
                dispatch.dispatch(ApplyOp::DespawnEntity {
                    entity: line.entity(),
                });
            }
        }
        debug!(id = %self.id, old_len, new_len, "lines replaced");
        Ok(())
    }

    /// Move the anchor (and optionally the world), restacking every line.
    ///
    /// Current viewers are despawned and cleared; the next scheduler pass
    /// respawns the hologram for whoever is in range of the new placement.
    pub fn relocate(
        self: &Arc<Self>,
        world: Option<WorldId>,
        anchor: DVec3,
        dispatch: &Dispatcher,
    ) -> Result<(), HoloError> {
        self.ensure_live()?;

        let mut layout = self.layout.write();
        let mut placement = layout.placement.clone();
        if let Some(world) = world {
            placement.world = world;
        }
        placement.anchor = anchor;
        placement.validate()?;

        layout.placement = placement;
        layout.restack(0);
        dispatch.dispatch(ApplyOp::HideAll {
            hologram: Arc::clone(self),
        });
        debug!(id = %self.id, world = %layout.placement.world, %anchor, "hologram relocated");
        Ok(())
    }

    /// Advance animated lines by `ticks`, pushing content-only updates for
    /// lines whose frame changed. Returns how many changed.
    pub fn advance_animations(self: &Arc<Self>, ticks: u64, dispatch: &Dispatcher) -> usize {
        let mut layout = self.layout.write();
        let watched = !self.viewers.read().is_empty();
        let mut changed = 0;
        for line in layout.lines.iter_mut() {
            if line.advance(ticks) {
                changed += 1;
                if watched {
                    dispatch.dispatch(ApplyOp::UpdateText {
                        hologram: Arc::clone(self),
                        entity: line.entity(),
                    });
                }
            }
        }
        changed
    }

    /// Poll the content provider, replacing all lines when it produced new content.
    pub fn refresh_content(
        self: &Arc<Self>,
        now: Instant,
        sources: &DataSources,
        dispatch: &Dispatcher,
    ) -> Result<bool, HoloError> {
        let Some(provider) = &self.provider else {
            return Ok(false);
        };
        let next = provider.lock().refresh(now, sources);
        match next {
            Some(contents) => {
                self.replace_lines(contents, dispatch)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Independent copy with the same line contents and variant at `placement`.
    pub fn duplicate(&self, id: HologramId, placement: Placement) -> Result<Self, HoloError> {
        let copy = Self::new(id, placement, self.contents(), Arc::clone(&self.entities))?;
        Ok(copy.with_kind(&self.kind()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::ApplyContext;
    use crate::registry::HologramRegistry;
    use mdholo_core::GAP;
    use mdholo_testkit::RecordingSink;

    fn sign(lines: &[&str]) -> Arc<Hologram> {
        let placement = Placement::new(WorldId::new("w"), DVec3::new(0.0, 64.0, 0.0), 10.0);
        let contents = lines.iter().map(|s| LineContent::text(*s)).collect();
        Arc::new(
            Hologram::new(
                HologramId::parse("sign").unwrap(),
                placement,
                contents,
                Arc::new(EntityIdAllocator::starting_at(1)),
            )
            .unwrap(),
        )
    }

    fn harness() -> (ApplyContext, Dispatcher, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let (ctx, dispatch) = ApplyContext::new(Arc::new(HologramRegistry::new()), sink.clone());
        (ctx, dispatch, sink)
    }

    fn assert_stacked(h: &Hologram) {
        let anchor_y = h.placement().anchor.y;
        for (i, offset) in h.offsets().into_iter().enumerate() {
            assert_eq!(offset, anchor_y - i as f64 * GAP, "line {i}");
        }
    }

    #[test]
    fn new_requires_lines_and_valid_placement() {
        let entities = Arc::new(EntityIdAllocator::default());
        let id = HologramId::parse("x").unwrap();
        let ok = Placement::new(WorldId::new("w"), DVec3::ZERO, 5.0);
        assert_eq!(
            Hologram::new(id.clone(), ok.clone(), Vec::new(), entities.clone()).unwrap_err(),
            HoloError::EmptyLines
        );
        let bad = Placement::new(WorldId::new("w"), DVec3::ZERO, 0.0);
        assert!(matches!(
            Hologram::new(id, bad, vec![LineContent::text("a")], entities).unwrap_err(),
            HoloError::InvalidPlacement(_)
        ));
    }

    #[test]
    fn insert_and_remove_scenario() {
        let (_ctx, dispatch, _sink) = harness();
        let h = sign(&["A"]);

        h.insert_line(0, LineContent::text("B"), &dispatch).unwrap();
        assert_eq!(h.texts(), vec!["B", "A"]);
        assert_stacked(&h);

        h.remove_line(0, &dispatch).unwrap();
        assert_eq!(h.texts(), vec!["A"]);
        assert_stacked(&h);

        assert_eq!(
            h.remove_line(0, &dispatch).unwrap_err(),
            HoloError::LastLineViolation("sign".into())
        );
        assert_eq!(h.texts(), vec!["A"]);
    }

    #[test]
    fn index_bounds_are_checked() {
        let (_ctx, dispatch, _sink) = harness();
        let h = sign(&["A", "B"]);
        assert_eq!(
            h.insert_line(3, LineContent::text("x"), &dispatch).unwrap_err(),
            HoloError::InvalidIndex { index: 3, len: 2 }
        );
        assert_eq!(
            h.remove_line(2, &dispatch).unwrap_err(),
            HoloError::InvalidIndex { index: 2, len: 2 }
        );
        assert_eq!(
            h.set_line(5, LineContent::text("x"), &dispatch).unwrap_err(),
            HoloError::InvalidIndex { index: 5, len: 2 }
        );
        // Inserting at len appends.
        h.insert_line(2, LineContent::text("C"), &dispatch).unwrap();
        assert_eq!(h.texts(), vec!["A", "B", "C"]);
        assert_stacked(&h);
    }

    #[test]
    fn insert_at_end_lands_at_requested_index_under_concurrent_adds() {
        let (_ctx, dispatch, _sink) = harness();
        let h = sign(&["base"]);

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for i in 0..200 {
                    h.add_line(LineContent::text(format!("add{i}")), &dispatch)
                        .unwrap();
                }
            });
            scope.spawn(|| {
                for i in 0..200 {
                    let len = h.texts().len();
                    let text = format!("ins{i}");
                    match h.insert_line(len, LineContent::text(text.clone()), &dispatch) {
                        Ok(()) => assert_eq!(h.texts()[len], text),
                        Err(HoloError::InvalidIndex { .. }) => {}
                        Err(err) => panic!("unexpected {err:?}"),
                    }
                }
            });
        });

        assert_stacked(&h);
        let entities = h.read_layout(|_, lines| {
            lines.iter().map(|line| line.entity()).collect::<BTreeSet<_>>()
        });
        assert_eq!(entities.len(), h.texts().len());
    }

    #[test]
    fn edits_reach_current_viewers_only() {
        let (mut ctx, dispatch, sink) = harness();
        let h = sign(&["A"]);
        let viewer = ViewerId(1);
        dispatch.dispatch(ApplyOp::ViewerJoined(viewer));
        dispatch.dispatch(ApplyOp::Show {
            hologram: h.clone(),
            viewer,
        });
        ctx.run_pending();
        assert_eq!(sink.spawned(viewer).len(), 1);

        h.add_line(LineContent::text("B"), &dispatch).unwrap();
        h.set_line(0, LineContent::text("A2"), &dispatch).unwrap();
        ctx.run_pending();

        assert_eq!(sink.spawned(viewer).len(), 2);
        assert_eq!(sink.text_of(viewer, h.read_layout(|_, l| l[0].entity())), Some("A2".into()));
        assert_eq!(sink.count_for(ViewerId(2)), 0);
    }

    #[test]
    fn remove_line_despawns_and_repositions() {
        let (mut ctx, dispatch, sink) = harness();
        let h = sign(&["A", "B", "C"]);
        let viewer = ViewerId(1);
        dispatch.dispatch(ApplyOp::ViewerJoined(viewer));
        dispatch.dispatch(ApplyOp::Show {
            hologram: h.clone(),
            viewer,
        });
        ctx.run_pending();
        let removed_entity = h.read_layout(|_, l| l[0].entity());
        let shifted = h.read_layout(|_, l| l[2].entity());

        h.remove_line(0, &dispatch).unwrap();
        ctx.run_pending();

        assert_eq!(sink.despawn_count(viewer, removed_entity), 1);
        assert_eq!(sink.position_of(viewer, shifted).map(|p| p.y), Some(64.0 - GAP));
        assert_eq!(sink.spawned(viewer).len(), 2);
    }

    #[test]
    fn set_line_is_idempotent() {
        let (_ctx, dispatch, _sink) = harness();
        let h = sign(&["A", "B"]);
        h.set_line(1, LineContent::text("x"), &dispatch).unwrap();
        let once = (h.contents(), h.offsets());
        h.set_line(1, LineContent::text("x"), &dispatch).unwrap();
        assert_eq!((h.contents(), h.offsets()), once);
    }

    #[test]
    fn replace_lines_reuses_entities_and_trims_tail() {
        let (mut ctx, dispatch, sink) = harness();
        let h = sign(&["A", "B", "C"]);
        let viewer = ViewerId(1);
        dispatch.dispatch(ApplyOp::ViewerJoined(viewer));
        dispatch.dispatch(ApplyOp::Show {
            hologram: h.clone(),
            viewer,
        });
        ctx.run_pending();
        let first = h.read_layout(|_, l| l[0].entity());
        let tail = h.read_layout(|_, l| l[2].entity());
        sink.clear();

        h.replace_lines(vec![LineContent::text("A"), LineContent::text("Z")], &dispatch)
            .unwrap();
        ctx.run_pending();

        assert_eq!(h.texts(), vec!["A", "Z"]);
        assert_eq!(h.read_layout(|_, l| l[0].entity()), first);
        // Unchanged first line is not re-sent.
        assert_eq!(sink.text_of(viewer, first), None);
        assert_eq!(sink.despawn_count(viewer, tail), 1);
        assert_stacked(&h);

        assert_eq!(
            h.replace_lines(Vec::new(), &dispatch).unwrap_err(),
            HoloError::EmptyLines
        );
    }

    #[test]
    fn relocate_restacks_and_clears_viewers() {
        let (mut ctx, dispatch, sink) = harness();
        let h = sign(&["A", "B"]);
        let viewer = ViewerId(1);
        dispatch.dispatch(ApplyOp::ViewerJoined(viewer));
        dispatch.dispatch(ApplyOp::Show {
            hologram: h.clone(),
            viewer,
        });
        ctx.run_pending();

        h.relocate(Some(WorldId::new("nether")), DVec3::new(5.0, 80.0, 5.0), &dispatch)
            .unwrap();
        ctx.run_pending();

        assert_eq!(h.placement().world, WorldId::new("nether"));
        assert_eq!(h.offsets(), vec![80.0, 80.0 - GAP]);
        assert!(!h.is_visible_to(viewer));
        assert!(sink.spawned(viewer).is_empty());

        assert!(matches!(
            h.relocate(None, DVec3::new(f64::NAN, 0.0, 0.0), &dispatch),
            Err(HoloError::InvalidPlacement(_))
        ));
        assert_eq!(h.placement().anchor, DVec3::new(5.0, 80.0, 5.0));
    }

    #[test]
    fn animations_push_updates_to_viewers() {
        let (mut ctx, dispatch, sink) = harness();
        let h = sign(&["static"]);
        let frames = vec!["1".to_string(), "2".to_string()];
        h.add_line(LineContent::animated(frames, 10).unwrap(), &dispatch)
            .unwrap();
        let viewer = ViewerId(1);
        dispatch.dispatch(ApplyOp::ViewerJoined(viewer));
        dispatch.dispatch(ApplyOp::Show {
            hologram: h.clone(),
            viewer,
        });
        ctx.run_pending();
        let animated = h.read_layout(|_, l| l[1].entity());
        assert_eq!(sink.text_of(viewer, animated), Some("1".into()));

        assert_eq!(h.advance_animations(10, &dispatch), 1);
        ctx.run_pending();
        assert_eq!(sink.text_of(viewer, animated), Some("2".into()));
        // Content-only: still exactly one spawn for the line.
        assert_eq!(sink.spawn_count(viewer, animated), 1);
    }

    #[test]
    fn duplicate_copies_contents_not_entities() {
        let h = sign(&["A", "B"]);
        let placement = Placement::new(WorldId::new("w"), DVec3::new(9.0, 70.0, 9.0), 10.0);
        let copy = h
            .duplicate(HologramId::parse("sign2").unwrap(), placement)
            .unwrap();
        assert_eq!(copy.contents(), h.contents());
        assert_eq!(copy.offsets(), vec![70.0, 70.0 - GAP]);
        let originals: Vec<_> = h.read_layout(|_, l| l.iter().map(Line::entity).collect());
        let copies: Vec<_> = copy.read_layout(|_, l| l.iter().map(Line::entity).collect());
        assert!(originals.iter().all(|e| !copies.contains(e)));
    }

    #[test]
    fn retired_holograms_reject_edits() {
        let (_ctx, dispatch, _sink) = harness();
        let h = sign(&["A"]);
        h.retire();
        assert!(matches!(
            h.add_line(LineContent::text("B"), &dispatch),
            Err(HoloError::NotFound(_))
        ));
    }
}
