//! Message encoding and decoding with framing.
//!
//! Frame format: `[length: u32][message_type: u8][payload: bytes]`, where
//! `length` counts the tag byte plus the postcard payload.

use crate::protocol::HoloMessage;
use anyhow::{Context, Result};

/// Bytes preceding the payload (length prefix + tag).
pub const FRAME_HEADER_LEN: usize = 5;

/// Encode a message with length prefix.
pub fn encode_message(msg: &HoloMessage) -> Result<Vec<u8>> {
    let payload = postcard::to_allocvec(msg).context("Failed to serialize hologram message")?;

    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());

    // Length (excluding length field itself)
    let length = (1 + payload.len()) as u32;
    frame.extend_from_slice(&length.to_le_bytes());
    frame.push(message_type_tag(msg));
    frame.extend_from_slice(&payload);

    Ok(frame)
}

/// Decode a message from frame data.
///
/// Expects data to start with length prefix.
pub fn decode_message(data: &[u8]) -> Result<HoloMessage> {
    if data.len() < FRAME_HEADER_LEN {
        return Err(anyhow::anyhow!(
            "Frame too short: {} bytes (minimum {})",
            data.len(),
            FRAME_HEADER_LEN
        ));
    }

    let length = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if length == 0 {
        anyhow::bail!("Frame length must include the type tag");
    }

    if data.len() < 4 + length {
        return Err(anyhow::anyhow!(
            "Incomplete frame: expected {} bytes, got {}",
            4 + length,
            data.len()
        ));
    }

    let tag = data[4];
    let payload = &data[FRAME_HEADER_LEN..4 + length];

    let msg: HoloMessage =
        postcard::from_bytes(payload).context("Failed to deserialize hologram message")?;

    if message_type_tag(&msg) != tag {
        anyhow::bail!(
            "Frame tag {} does not match payload type {}",
            tag,
            message_type_tag(&msg)
        );
    }

    Ok(msg)
}

fn message_type_tag(msg: &HoloMessage) -> u8 {
    match msg {
        HoloMessage::SpawnText { .. } => 0,
        HoloMessage::SpawnItem { .. } => 1,
        HoloMessage::UpdateText { .. } => 2,
        HoloMessage::Teleport { .. } => 3,
        HoloMessage::Despawn { .. } => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;
    use mdholo_core::EntityId;

    #[test]
    fn test_encode_decode_spawn_text() {
        let msg = HoloMessage::SpawnText {
            entity: EntityId(42),
            position: DVec3::new(0.5, 64.0, -3.0),
            text: "Welcome".to_string(),
        };

        let encoded = encode_message(&msg).expect("Failed to encode");
        let decoded = decode_message(&encoded).expect("Failed to decode");

        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_decode_incomplete_frame() {
        let data = vec![10, 0, 0, 0, 4];
        assert!(decode_message(&data).is_err());
    }

    #[test]
    fn test_decode_too_short() {
        let data = vec![1, 2, 3];
        assert!(decode_message(&data).is_err());
    }

    #[test]
    fn test_decode_zero_length() {
        let data = vec![0, 0, 0, 0, 0];
        assert!(decode_message(&data).is_err());
    }

    #[test]
    fn test_decode_rejects_mismatched_tag() {
        let msg = HoloMessage::Despawn {
            entity: EntityId(3),
        };
        let mut encoded = encode_message(&msg).expect("Failed to encode");
        encoded[4] = 0;
        assert!(decode_message(&encoded).is_err());
    }
}
