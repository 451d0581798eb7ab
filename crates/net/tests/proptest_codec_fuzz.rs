//! Fuzz-style property tests for the hologram codec
//!
//! These tests validate that the decoder handles arbitrary
//! network input gracefully without crashing.

use glam::DVec3;
use mdholo_core::EntityId;
use mdholo_net::{decode_message, encode_message, HoloMessage, FRAME_HEADER_LEN};
use proptest::prelude::*;

proptest! {
    /// Property: Arbitrary bytes don't crash the decoder
    #[test]
    fn arbitrary_bytes_dont_crash(
        random_bytes in prop::collection::vec(any::<u8>(), 0..2000),
    ) {
        let _result = decode_message(&random_bytes);
        // No panic = success
    }

    /// Property: Spawn messages roundtrip for any text and finite position
    #[test]
    fn spawn_text_roundtrips(
        entity in any::<u64>(),
        x in -3.0e7f64..3.0e7,
        y in -64.0f64..320.0,
        z in -3.0e7f64..3.0e7,
        text in ".{0,64}",
    ) {
        let msg = HoloMessage::SpawnText {
            entity: EntityId(entity),
            position: DVec3::new(x, y, z),
            text,
        };

        let encoded = encode_message(&msg).unwrap();
        let decoded = decode_message(&encoded).unwrap();

        prop_assert_eq!(msg, decoded);
    }

    /// Property: Truncated frames are rejected, never panicking
    #[test]
    fn truncated_frames_are_rejected(
        entity in any::<u64>(),
        text in "[a-z]{1,32}",
        cut in 1usize..8,
    ) {
        let msg = HoloMessage::UpdateText { entity: EntityId(entity), text };
        let encoded = encode_message(&msg).unwrap();
        let keep = encoded.len().saturating_sub(cut).max(FRAME_HEADER_LEN - 1);
        prop_assert!(decode_message(&encoded[..keep]).is_err());
    }
}
