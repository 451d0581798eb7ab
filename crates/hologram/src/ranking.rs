//! Self-refreshing content: custom per-tick providers and the ranking board.

use crate::error::HoloError;
use crate::hologram::HologramKind;
use crate::line::LineContent;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One scored entry of a ranked data source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankEntry {
    /// Display name of the ranked participant.
    pub name: String,
    /// Score on the objective.
    pub score: i64,
}

/// External ranked data (scoreboard objectives and the like).
pub trait RankingSource: Send + Sync {
    /// Highest `count` entries for `objective`, best first.
    fn top(&self, objective: &str, count: usize) -> Vec<RankEntry>;
}

/// Source with no objectives; every board renders its empty format.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRankings;

impl RankingSource for NoRankings {
    fn top(&self, _objective: &str, _count: usize) -> Vec<RankEntry> {
        Vec::new()
    }
}

/// External data handed to providers on refresh.
#[derive(Clone)]
pub struct DataSources {
    /// Ranked data backing ranking boards.
    pub ranking: Arc<dyn RankingSource>,
}

impl Default for DataSources {
    fn default() -> Self {
        Self {
            ranking: Arc::new(NoRankings),
        }
    }
}

/// Recomputes a hologram's whole line list on its own cadence.
pub trait ContentProvider: Send + fmt::Debug {
    /// New content when it is due and differs from the previous snapshot.
    fn refresh(&mut self, now: Instant, sources: &DataSources) -> Option<Vec<LineContent>>;

    /// Record the content currently shown so an identical refresh is suppressed.
    fn prime(&mut self, current: &[LineContent]);

    /// Persisted description of the provider-driven variant.
    fn kind(&self) -> HologramKind;
}

/// Ranking board settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RankingConfig {
    /// Objective queried from the [`RankingSource`].
    pub objective: String,
    /// Entries shown.
    pub top_count: usize,
    /// Time between recomputations.
    pub update_interval: Duration,
    /// First line; `{objective}` is substituted.
    pub header_format: String,
    /// One line per entry; `{rank}`, `{name}`, `{score}`, `{objective}` are substituted.
    pub player_format: String,
    /// Shown instead of entries when there are none.
    pub empty_format: String,
}

impl RankingConfig {
    /// Board for `objective` with stock formats.
    pub fn new(objective: impl Into<String>, top_count: usize) -> Self {
        Self {
            objective: objective.into(),
            top_count,
            update_interval: Duration::from_secs(10),
            header_format: "Top {objective}".to_string(),
            player_format: "#{rank} {name} - {score}".to_string(),
            empty_format: "No entries yet".to_string(),
        }
    }

    /// Check the settings survive a store round trip.
    pub fn validate(&self) -> Result<(), HoloError> {
        let invalid = |reason: String| HoloError::InvalidKind {
            kind: "ranking",
            reason,
        };
        if self.top_count == 0 {
            return Err(invalid("topCount must be at least 1".into()));
        }
        if self.update_interval.is_zero() {
            return Err(invalid("update interval must be positive".into()));
        }
        let seconds = self.update_interval.as_secs_f64();
        Duration::try_from_secs_f64(seconds).map_err(|err| {
            invalid(format!("update interval {seconds}s: {err}"))
        })?;
        Ok(())
    }

    /// Render the board for `entries`.
    pub fn render(&self, entries: &[RankEntry]) -> Vec<LineContent> {
        let mut lines = Vec::with_capacity(entries.len() + 1);
        lines.push(LineContent::Text(
            self.header_format.replace("{objective}", &self.objective),
        ));
        if entries.is_empty() {
            lines.push(LineContent::Text(
                self.empty_format.replace("{objective}", &self.objective),
            ));
            return lines;
        }
        for (rank, entry) in entries.iter().take(self.top_count).enumerate() {
            let text = self
                .player_format
                .replace("{rank}", &(rank + 1).to_string())
                .replace("{name}", &entry.name)
                .replace("{score}", &entry.score.to_string())
                .replace("{objective}", &self.objective);
            lines.push(LineContent::Text(text));
        }
        lines
    }
}

/// Provider rebuilding lines from a ranked objective.
#[derive(Debug, Clone)]
pub struct RankingBoard {
    config: RankingConfig,
    last_refresh: Option<Instant>,
    snapshot: Option<Vec<LineContent>>,
}

impl RankingBoard {
    /// Board with no refresh history; the first poll is due immediately.
    pub fn new(config: RankingConfig) -> Self {
        Self {
            config,
            last_refresh: None,
            snapshot: None,
        }
    }

    /// Board settings.
    pub fn config(&self) -> &RankingConfig {
        &self.config
    }
}

impl ContentProvider for RankingBoard {
    fn refresh(&mut self, now: Instant, sources: &DataSources) -> Option<Vec<LineContent>> {
        if let Some(last) = self.last_refresh {
            if now.saturating_duration_since(last) < self.config.update_interval {
                return None;
            }
        }
        self.last_refresh = Some(now);

        let entries = sources
            .ranking
            .top(&self.config.objective, self.config.top_count);
        let content = self.config.render(&entries);
        if self.snapshot.as_ref() == Some(&content) {
            return None;
        }
        self.snapshot = Some(content.clone());
        Some(content)
    }

    fn prime(&mut self, current: &[LineContent]) {
        self.snapshot = Some(current.to_vec());
    }

    fn kind(&self) -> HologramKind {
        HologramKind::Ranking(self.config.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct FixedScores(Mutex<Vec<RankEntry>>);

    impl RankingSource for FixedScores {
        fn top(&self, _objective: &str, count: usize) -> Vec<RankEntry> {
            self.0.lock().iter().take(count).cloned().collect()
        }
    }

    fn entry(name: &str, score: i64) -> RankEntry {
        RankEntry {
            name: name.to_string(),
            score,
        }
    }

    #[test]
    fn render_substitutes_placeholders() {
        let config = RankingConfig::new("kills", 2);
        let lines = config.render(&[entry("ana", 9), entry("bo", 4), entry("cy", 1)]);
        assert_eq!(
            lines,
            vec![
                LineContent::text("Top kills"),
                LineContent::text("#1 ana - 9"),
                LineContent::text("#2 bo - 4"),
            ]
        );
    }

    #[test]
    fn render_uses_empty_format_without_entries() {
        let config = RankingConfig::new("kills", 3);
        assert_eq!(
            config.render(&[]),
            vec![
                LineContent::text("Top kills"),
                LineContent::text("No entries yet")
            ]
        );
    }

    #[test]
    fn refresh_respects_interval_and_suppresses_unchanged_content() {
        let scores = Arc::new(FixedScores(Mutex::new(vec![entry("ana", 1)])));
        let sources = DataSources {
            ranking: scores.clone(),
        };
        let mut config = RankingConfig::new("kills", 5);
        config.update_interval = Duration::from_secs(5);
        let mut board = RankingBoard::new(config);

        let t0 = Instant::now();
        assert!(board.refresh(t0, &sources).is_some());
        // Not due yet.
        scores.0.lock()[0].score = 2;
        assert!(board.refresh(t0 + Duration::from_secs(1), &sources).is_none());
        // Due and changed.
        let next = board.refresh(t0 + Duration::from_secs(5), &sources).unwrap();
        assert_eq!(next[1], LineContent::text("#1 ana - 2"));
        // Due but identical by value.
        assert!(board.refresh(t0 + Duration::from_secs(10), &sources).is_none());
    }

    #[test]
    fn primed_board_skips_identical_first_refresh() {
        let config = RankingConfig::new("kills", 5);
        let mut board = RankingBoard::new(config.clone());
        board.prime(&config.render(&[]));
        assert!(board.refresh(Instant::now(), &DataSources::default()).is_none());
    }

    #[test]
    fn validate_rejects_boards_the_store_cannot_hold() {
        assert!(RankingConfig::new("kills", 3).validate().is_ok());
        assert!(RankingConfig::new("kills", 0).validate().is_err());

        let mut config = RankingConfig::new("kills", 3);
        config.update_interval = Duration::ZERO;
        assert!(config.validate().is_err());

        config.update_interval = Duration::MAX;
        assert!(matches!(
            config.validate(),
            Err(HoloError::InvalidKind { kind: "ranking", .. })
        ));
    }
}
