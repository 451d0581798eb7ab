//! A single row of a hologram: static text or an animated frame cycle.

use crate::error::HoloError;
use mdholo_core::EntityId;
use mdholo_net::MAX_TEXT_LEN;

/// What a line displays.
#[derive(Debug, Clone, PartialEq)]
pub enum LineContent {
    /// Fixed text.
    Text(String),
    /// Frames cycled every `interval_ticks` simulation ticks.
    Animated {
        /// Non-empty ordered frame list.
        frames: Vec<String>,
        /// Ticks each frame stays on screen, at least 1.
        interval_ticks: u64,
    },
}

impl LineContent {
    /// Static text line.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Animated line. Fails with [`HoloError::EmptyLines`] when `frames` is empty.
    pub fn animated(frames: Vec<String>, interval_ticks: u64) -> Result<Self, HoloError> {
        let content = Self::Animated {
            frames,
            interval_ticks: interval_ticks.max(1),
        };
        content.validate()?;
        Ok(content)
    }

    /// Check the invariants [`LineContent::animated`] enforces, plus the
    /// protocol's per-line text limit.
    pub fn validate(&self) -> Result<(), HoloError> {
        let texts: &[String] = match self {
            Self::Text(text) => std::slice::from_ref(text),
            Self::Animated { frames, .. } if frames.is_empty() => {
                return Err(HoloError::EmptyLines)
            }
            Self::Animated {
                interval_ticks: 0, ..
            } => return Err(HoloError::ZeroInterval),
            Self::Animated { frames, .. } => frames.as_slice(),
        };
        match texts.iter().find(|text| text.len() > MAX_TEXT_LEN) {
            Some(text) => Err(HoloError::LineTooLong {
                len: text.len(),
                max: MAX_TEXT_LEN,
            }),
            None => Ok(()),
        }
    }
}

/// One stacked line with its client entity and animation cursor.
#[derive(Debug, Clone)]
pub struct Line {
    content: LineContent,
    offset: f64,
    entity: EntityId,
    frame: usize,
    elapsed: u64,
}

impl Line {
    pub(crate) fn new(content: LineContent, offset: f64, entity: EntityId) -> Self {
        Self {
            content,
            offset,
            entity,
            frame: 0,
            elapsed: 0,
        }
    }

    /// Displayed content.
    pub fn content(&self) -> &LineContent {
        &self.content
    }

    /// Absolute vertical position.
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Client entity representing this line for every viewer.
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Index of the frame currently shown (always 0 for static text).
    pub fn frame_index(&self) -> usize {
        self.frame
    }

    /// Text currently shown.
    pub fn current_text(&self) -> &str {
        match &self.content {
            LineContent::Text(text) => text,
            LineContent::Animated { frames, .. } => frames
                .get(self.frame)
                .or_else(|| frames.first())
                .map_or("", String::as_str),
        }
    }

    /// Replace content in place, restarting any animation.
    pub(crate) fn set_content(&mut self, content: LineContent) {
        self.content = content;
        self.frame = 0;
        self.elapsed = 0;
    }

    pub(crate) fn set_offset(&mut self, offset: f64) {
        self.offset = offset;
    }

    /// Advance the animation clock by `ticks`.
    ///
    /// Returns true when the visible frame changed.
    pub(crate) fn advance(&mut self, ticks: u64) -> bool {
        let LineContent::Animated {
            frames,
            interval_ticks,
        } = &self.content
        else {
            return false;
        };

        self.elapsed += ticks;
        if self.elapsed < *interval_ticks {
            return false;
        }
        self.elapsed = 0;

        let previous = self.frame;
        self.frame = (self.frame + 1) % frames.len().max(1);
        self.frame != previous
    }
}
