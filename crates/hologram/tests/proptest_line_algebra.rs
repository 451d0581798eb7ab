//! Property tests for the line-mutation algebra and the record boundary.

use glam::DVec3;
use mdholo_core::{EntityIdAllocator, HologramId, WorldId, GAP};
use mdholo_hologram::{
    from_record, to_record, ApplyContext, Dispatcher, Hologram, HologramRegistry, LineContent,
    Placement,
};
use mdholo_testkit::RecordingSink;
use proptest::prelude::*;
use std::sync::Arc;

fn dispatcher() -> (ApplyContext, Dispatcher) {
    ApplyContext::new(
        Arc::new(HologramRegistry::new()),
        Arc::new(RecordingSink::new()),
    )
}

fn content_strategy() -> impl Strategy<Value = LineContent> {
    prop_oneof![
        "[a-zA-Z0-9 ]{0,16}".prop_map(LineContent::Text),
        (prop::collection::vec("[a-z]{1,8}", 1..4), 1u64..200).prop_map(
            |(frames, interval_ticks)| LineContent::Animated {
                frames,
                interval_ticks,
            }
        ),
    ]
}

fn build(anchor_y: f64, contents: Vec<LineContent>) -> Arc<Hologram> {
    Arc::new(
        Hologram::new(
            HologramId::parse("prop").unwrap(),
            Placement::new(WorldId::new("w"), DVec3::new(3.0, anchor_y, -7.0), 12.0),
            contents,
            Arc::new(EntityIdAllocator::default()),
        )
        .unwrap(),
    )
}

fn assert_stacked(h: &Hologram) -> Result<(), TestCaseError> {
    let anchor_y = h.placement().anchor.y;
    for (i, offset) in h.offsets().into_iter().enumerate() {
        prop_assert_eq!(offset, anchor_y - i as f64 * GAP);
    }
    Ok(())
}

proptest! {
    /// Property: insert then remove at the same index restores the line list
    #[test]
    fn insert_then_remove_is_identity(
        contents in prop::collection::vec(content_strategy(), 1..8),
        extra in content_strategy(),
        pick in any::<prop::sample::Index>(),
        anchor_y in -64.0f64..320.0,
    ) {
        let (_ctx, dispatch) = dispatcher();
        let h = build(anchor_y, contents.clone());
        let index = pick.index(contents.len() + 1);

        h.insert_line(index, extra, &dispatch).unwrap();
        assert_stacked(&h)?;
        h.remove_line(index, &dispatch).unwrap();

        prop_assert_eq!(h.contents(), contents);
        assert_stacked(&h)?;
    }

    /// Property: offsets stay stacked and lines never empty under random edits
    #[test]
    fn random_edits_keep_invariants(
        seed_lines in prop::collection::vec(content_strategy(), 1..4),
        ops in prop::collection::vec((0u8..4, any::<prop::sample::Index>(), content_strategy()), 0..24),
    ) {
        let (_ctx, dispatch) = dispatcher();
        let h = build(64.0, seed_lines);
        for (kind, pick, content) in ops {
            let len = h.line_count();
            match kind {
                0 => { h.add_line(content, &dispatch).unwrap(); }
                1 => h.insert_line(pick.index(len + 1), content, &dispatch).unwrap(),
                2 => { let _ = h.remove_line(pick.index(len), &dispatch); }
                _ => h.set_line(pick.index(len), content, &dispatch).unwrap(),
            }
            prop_assert!(h.line_count() >= 1);
            assert_stacked(&h)?;
        }
    }

    /// Property: set_line twice equals set_line once
    #[test]
    fn set_line_idempotent(
        contents in prop::collection::vec(content_strategy(), 1..6),
        replacement in content_strategy(),
        pick in any::<prop::sample::Index>(),
    ) {
        let (_ctx, dispatch) = dispatcher();
        let h = build(64.0, contents.clone());
        let index = pick.index(contents.len());

        h.set_line(index, replacement.clone(), &dispatch).unwrap();
        let once = (h.contents(), h.texts(), h.offsets());
        h.set_line(index, replacement, &dispatch).unwrap();
        prop_assert_eq!((h.contents(), h.texts(), h.offsets()), once);
    }

    /// Property: from_record(to_record(h)) reproduces h
    #[test]
    fn record_round_trip(
        contents in prop::collection::vec(content_strategy(), 1..6),
        x in -1.0e6f64..1.0e6,
        y in -64.0f64..320.0,
        z in -1.0e6f64..1.0e6,
        range in 0.5f64..256.0,
    ) {
        let h = Arc::new(
            Hologram::new(
                HologramId::parse("Round_Trip").unwrap(),
                Placement::new(WorldId::new("world_nether"), DVec3::new(x, y, z), range),
                contents,
                Arc::new(EntityIdAllocator::default()),
            )
            .unwrap(),
        );
        let restored = from_record(to_record(&h), Arc::new(EntityIdAllocator::default())).unwrap();

        prop_assert_eq!(restored.id().as_str(), "Round_Trip");
        prop_assert_eq!(restored.placement(), h.placement());
        prop_assert_eq!(restored.contents(), h.contents());
        prop_assert_eq!(restored.kind(), h.kind());
    }
}
