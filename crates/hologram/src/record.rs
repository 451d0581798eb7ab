//! Persistence boundary: conversion between holograms and storage records.
//!
//! Records are plain serde structures; the storage format is the adapter's
//! business.

use crate::error::HoloError;
use crate::hologram::{Hologram, HologramKind, Placement};
use crate::line::LineContent;
use crate::ranking::RankingConfig;
use glam::DVec3;
use mdholo_core::{EntityIdAllocator, HologramId, WorldId, TICKS_PER_SECOND};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Stored form of one hologram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HologramRecord {
    /// Hologram id.
    pub id: String,
    /// World name.
    pub world: String,
    /// Anchor x.
    pub x: f64,
    /// Anchor y.
    pub y: f64,
    /// Anchor z.
    pub z: f64,
    /// Visibility radius.
    pub range: f64,
    /// Ordered lines.
    pub lines: Vec<LineRecord>,
    /// Variant and its fields.
    #[serde(flatten)]
    pub kind: KindRecord,
}

/// Stored form of one line: bare text or an animation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LineRecord {
    /// Static text.
    Text(String),
    /// Animated frames.
    Animated(AnimatedRecord),
}

/// Stored form of an animated line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimatedRecord {
    /// Always true; distinguishes animations from other objects.
    pub animated: bool,
    /// Seconds per frame.
    pub interval_seconds: f64,
    /// Ordered frames.
    pub frames: Vec<String>,
}

/// Stored variant tag and type-specific fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum KindRecord {
    /// Lines only.
    Standard,
    /// Floating item decoration.
    Item {
        /// Item identifier.
        #[serde(rename = "itemId")]
        item_id: String,
    },
    /// Ranking board.
    Ranking {
        /// Objective queried.
        objective: String,
        /// Entries shown.
        #[serde(rename = "topCount")]
        top_count: usize,
        /// Seconds between recomputations.
        #[serde(rename = "updateIntervalSeconds")]
        update_interval_seconds: f64,
        /// Header line format.
        #[serde(rename = "headerFormat")]
        header_format: String,
        /// Per-entry line format.
        #[serde(rename = "playerFormat")]
        player_format: String,
        /// Line shown without entries.
        #[serde(rename = "emptyFormat")]
        empty_format: String,
    },
}

/// Describe `hologram` as a storage record.
pub fn to_record(hologram: &Hologram) -> HologramRecord {
    let placement = hologram.placement();
    HologramRecord {
        id: hologram.id().to_string(),
        world: placement.world.to_string(),
        x: placement.anchor.x,
        y: placement.anchor.y,
        z: placement.anchor.z,
        range: placement.range,
        lines: hologram.contents().iter().map(line_to_record).collect(),
        kind: kind_to_record(&hologram.kind()),
    }
}

/// Rebuild a hologram from a storage record.
///
/// Any structural problem is reported as [`HoloError::MalformedRecord`] so the
/// loader can skip this record and continue with the rest.
pub fn from_record(
    record: HologramRecord,
    entities: Arc<EntityIdAllocator>,
) -> Result<Hologram, HoloError> {
    let raw_id = record.id.clone();
    let malformed = |reason: String| HoloError::malformed(raw_id.clone(), reason);

    let id = HologramId::parse(&record.id).map_err(|err| malformed(err.to_string()))?;
    if record.world.trim().is_empty() {
        return Err(malformed("world is empty".into()));
    }
    let placement = Placement::new(
        WorldId::new(record.world),
        DVec3::new(record.x, record.y, record.z),
        record.range,
    );
    let contents = record
        .lines
        .into_iter()
        .map(line_from_record)
        .collect::<Result<Vec<_>, String>>()
        .map_err(malformed)?;
    let kind = kind_from_record(record.kind).map_err(malformed)?;

    let hologram =
        Hologram::new(id, placement, contents, entities).map_err(|err| malformed(err.to_string()))?;
    Ok(hologram.with_kind(&kind))
}

fn line_to_record(content: &LineContent) -> LineRecord {
    match content {
        LineContent::Text(text) => LineRecord::Text(text.clone()),
        LineContent::Animated {
            frames,
            interval_ticks,
        } => LineRecord::Animated(AnimatedRecord {
            animated: true,
            interval_seconds: *interval_ticks as f64 / TICKS_PER_SECOND as f64,
            frames: frames.clone(),
        }),
    }
}

fn line_from_record(record: LineRecord) -> Result<LineContent, String> {
    match record {
        LineRecord::Text(text) => Ok(LineContent::Text(text)),
        LineRecord::Animated(animated) => {
            if !animated.animated {
                return Err("line object without `animated: true`".into());
            }
            let ticks = seconds_to_ticks(animated.interval_seconds)?;
            LineContent::animated(animated.frames, ticks).map_err(|err| err.to_string())
        }
    }
}

fn seconds_to_ticks(seconds: f64) -> Result<u64, String> {
    if !(seconds.is_finite() && seconds > 0.0) {
        return Err(format!("interval {seconds} must be a positive number"));
    }
    Ok(((seconds * TICKS_PER_SECOND as f64).round() as u64).max(1))
}

fn kind_to_record(kind: &HologramKind) -> KindRecord {
    match kind {
        HologramKind::Standard => KindRecord::Standard,
        HologramKind::Item { item_id } => KindRecord::Item {
            item_id: item_id.clone(),
        },
        HologramKind::Ranking(config) => KindRecord::Ranking {
            objective: config.objective.clone(),
            top_count: config.top_count,
            update_interval_seconds: config.update_interval.as_secs_f64(),
            header_format: config.header_format.clone(),
            player_format: config.player_format.clone(),
            empty_format: config.empty_format.clone(),
        },
    }
}

fn kind_from_record(record: KindRecord) -> Result<HologramKind, String> {
    match record {
        KindRecord::Standard => Ok(HologramKind::Standard),
        KindRecord::Item { item_id } => {
            let kind = HologramKind::Item { item_id };
            kind.validate().map_err(|err| err.to_string())?;
            Ok(kind)
        }
        KindRecord::Ranking {
            objective,
            top_count,
            update_interval_seconds,
            header_format,
            player_format,
            empty_format,
        } => {
            if !(update_interval_seconds.is_finite() && update_interval_seconds > 0.0) {
                return Err(format!(
                    "updateIntervalSeconds {update_interval_seconds} must be a positive number"
                ));
            }
            let update_interval = Duration::try_from_secs_f64(update_interval_seconds)
                .map_err(|err| format!("updateIntervalSeconds {update_interval_seconds}: {err}"))?;
            let config = RankingConfig {
                objective,
                top_count,
                update_interval,
                header_format,
                player_format,
                empty_format,
            };
            config.validate().map_err(|err| err.to_string())?;
            Ok(HologramKind::Ranking(config))
        }
    }
}
