//! Score records and the leaderboard
//!
//! The end of every run appends one [`ScoreRecord`] to a [`ScoreLedger`].
//! Rank is "how many recorded scores are strictly greater, plus one".

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Version stamped into run metadata
pub const RUN_META_VERSION: u32 = 1;

/// A named score band awarded at the end of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrizeGroup {
    #[serde(default)]
    pub min: f64,
    #[serde(default)]
    pub max: f64,
    #[serde(default)]
    pub name: String,
}

impl PrizeGroup {
    pub fn new(min: f64, max: f64, name: &str) -> Self {
        Self {
            min,
            max,
            name: name.to_string(),
        }
    }
}

/// Find the prize group for `score`.
///
/// Groups are sorted by `min`; ranges are half-open except the last, which
/// includes its `max`. Groups with `max < min` are ignored.
pub fn prize_group_for<'a>(prizes: &'a [PrizeGroup], score: f64) -> Option<&'a PrizeGroup> {
    let mut groups: Vec<&PrizeGroup> = prizes
        .iter()
        .filter(|g| g.min.is_finite() && g.max.is_finite() && g.max >= g.min)
        .collect();
    groups.sort_by(|a, b| a.min.total_cmp(&b.min).then(a.max.total_cmp(&b.max)));

    let last = groups.len().saturating_sub(1);
    groups.into_iter().enumerate().find_map(|(i, g)| {
        let inside = if i == last {
            score >= g.min && score <= g.max
        } else {
            score >= g.min && score < g.max
        };
        inside.then_some(g)
    })
}

/// Board dimensions stored with a run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoardSize {
    pub w: f32,
    pub h: f32,
}

/// Metadata stored with a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMeta {
    /// ISO-8601 start of the run
    pub started_at: String,
    pub duration_ms: u64,
    pub active_time_ms: u64,
    pub board: BoardSize,
    pub version: u32,
}

/// One finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub run_id: String,
    pub player_name: String,
    pub score: f64,
    /// ISO-8601 timestamp of the end of the run
    pub played_at: String,
    #[serde(default)]
    pub prize_group: Option<String>,
    /// Free-form metadata, usually a serialized [`RunMeta`]
    #[serde(default)]
    pub meta: Value,
}

/// Leaderboard row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub player_name: String,
    pub score: f64,
    pub played_at: Option<String>,
}

impl From<&ScoreRecord> for LeaderboardEntry {
    fn from(r: &ScoreRecord) -> Self {
        Self {
            player_name: r.player_name.clone(),
            score: r.score,
            played_at: Some(r.played_at.clone()),
        }
    }
}

/// Append-only score store shared with the end-of-run workers
pub trait ScoreLedger: Send + Sync {
    /// Append one record
    fn append(&self, record: &ScoreRecord) -> Result<()>;
    /// 1-based rank of `score` among all recorded scores
    fn rank_for(&self, score: f64) -> Result<usize>;
    /// Best `n` records, score descending
    fn top(&self, n: usize) -> Result<Vec<LeaderboardEntry>>;
}

/// In-memory leaderboard
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HighScores {
    pub entries: Vec<ScoreRecord>,
}

impl HighScores {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn from_records(entries: Vec<ScoreRecord>) -> Self {
        Self { entries }
    }

    pub fn add(&mut self, record: ScoreRecord) {
        self.entries.push(record);
    }

    /// Rank a score would get: count of strictly greater scores, plus one
    pub fn rank_of(&self, score: f64) -> usize {
        self.entries.iter().filter(|e| e.score > score).count() + 1
    }

    /// Best `n` entries, score descending; ties keep insertion order
    pub fn top(&self, n: usize) -> Vec<LeaderboardEntry> {
        let mut sorted: Vec<&ScoreRecord> = self.entries.iter().collect();
        sorted.sort_by(|a, b| b.score.total_cmp(&a.score));
        sorted.into_iter().take(n).map(LeaderboardEntry::from).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn top_score(&self) -> Option<f64> {
        self.entries.iter().map(|e| e.score).max_by(|a, b| a.total_cmp(b))
    }
}

fn poisoned<T>(_: T) -> Error {
    Error::Ledger("leaderboard lock poisoned".to_string())
}

impl ScoreLedger for Mutex<HighScores> {
    fn append(&self, record: &ScoreRecord) -> Result<()> {
        self.lock().map_err(poisoned)?.add(record.clone());
        Ok(())
    }

    fn rank_for(&self, score: f64) -> Result<usize> {
        Ok(self.lock().map_err(poisoned)?.rank_of(score))
    }

    fn top(&self, n: usize) -> Result<Vec<LeaderboardEntry>> {
        Ok(self.lock().map_err(poisoned)?.top(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, score: f64) -> ScoreRecord {
        ScoreRecord {
            run_id: format!("run-{name}"),
            player_name: name.to_string(),
            score,
            played_at: "2025-01-01T00:00:00.000Z".to_string(),
            prize_group: None,
            meta: Value::Null,
        }
    }

    #[test]
    fn test_rank_counts_strictly_greater() {
        let scores = HighScores::from_records(vec![
            record("a", 10.0),
            record("b", 5.0),
            record("c", 5.0),
            record("d", 1.0),
        ]);
        assert_eq!(scores.rank_of(20.0), 1);
        assert_eq!(scores.rank_of(10.0), 1);
        assert_eq!(scores.rank_of(5.0), 2);
        assert_eq!(scores.rank_of(4.5), 4);
        assert_eq!(scores.rank_of(0.0), 5);
    }

    #[test]
    fn test_top_is_sorted_and_limited() {
        let mut scores = HighScores::new();
        for i in 0..15 {
            scores.add(record(&format!("p{i}"), i as f64));
        }
        let top = scores.top(10);
        assert_eq!(top.len(), 10);
        assert_eq!(top[0].score, 14.0);
        assert_eq!(top[9].score, 5.0);
        assert_eq!(scores.top_score(), Some(14.0));
    }

    #[test]
    fn test_mutex_ledger() {
        let ledger = Mutex::new(HighScores::new());
        assert_eq!(ledger.rank_for(3.0).unwrap(), 1);
        ledger.append(&record("x", 7.0)).unwrap();
        ledger.append(&record("y", 2.0)).unwrap();
        assert_eq!(ledger.rank_for(3.0).unwrap(), 2);
        assert_eq!(ledger.top(1).unwrap()[0].player_name, "x");
    }

    #[test]
    fn test_prize_groups() {
        let prizes = vec![
            PrizeGroup::new(10.0, 15.0, "B"),
            PrizeGroup::new(1.0, 10.0, "A"),
            PrizeGroup::new(15.0, 25.0, "C"),
            PrizeGroup::new(30.0, 20.0, "broken"),
        ];
        assert_eq!(prize_group_for(&prizes, 0.5), None);
        assert_eq!(prize_group_for(&prizes, 1.0).map(|g| g.name.as_str()), Some("A"));
        assert_eq!(prize_group_for(&prizes, 10.0).map(|g| g.name.as_str()), Some("B"));
        // Last range includes its upper bound
        assert_eq!(prize_group_for(&prizes, 25.0).map(|g| g.name.as_str()), Some("C"));
        assert_eq!(prize_group_for(&prizes, 25.5), None);
    }
}
