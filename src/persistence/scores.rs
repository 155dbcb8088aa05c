//! Append-only score file
//!
//! One JSON object per line. Reads skip lines that fail to parse, so a torn
//! final line never hides the rest of the leaderboard.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::highscores::{HighScores, LeaderboardEntry, ScoreLedger, ScoreRecord};

/// Default display name for rows without one
pub const ANONYMOUS: &str = "Anonymous";
/// Longest stored player name, in characters
pub const MAX_NAME_CHARS: usize = 80;

#[derive(Debug)]
pub struct ScoreFile {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ScoreFile {
    /// Open (and create if missing) the score file at `path`
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Normalize and append one raw row; returns the stored record
    pub fn append_raw(&self, raw: &Value) -> Result<ScoreRecord> {
        let record = normalize_row(raw);
        self.append_record(&record)?;
        Ok(record)
    }

    fn append_record(&self, record: &ScoreRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| Error::Ledger("score file lock poisoned".to_string()))?;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        log::debug!("Appended run {} ({}) to {}", record.run_id, record.score, self.path.display());
        Ok(())
    }

    /// Every readable row, in file order
    pub fn read_all(&self) -> Result<Vec<ScoreRecord>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut rows = Vec::new();
        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(line) {
                Ok(raw) => rows.push(normalize_row(&raw)),
                Err(e) => log::warn!("Skipping unreadable score line {}: {}", i + 1, e),
            }
        }
        Ok(rows)
    }

    pub fn load(&self) -> Result<HighScores> {
        Ok(HighScores::from_records(self.read_all()?))
    }
}

impl ScoreLedger for ScoreFile {
    fn append(&self, record: &ScoreRecord) -> Result<()> {
        let raw = serde_json::to_value(record)?;
        self.append_raw(&raw).map(|_| ())
    }

    fn rank_for(&self, score: f64) -> Result<usize> {
        let score = if score.is_finite() { score } else { 0.0 };
        Ok(self.load()?.rank_of(score))
    }

    fn top(&self, n: usize) -> Result<Vec<LeaderboardEntry>> {
        Ok(self.load()?.top(n))
    }
}

/// Coerce a numeric field the way loosely typed clients send it
pub fn parse_score(v: &Value) -> f64 {
    let n = match v {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        Value::Bool(true) => 1.0,
        _ => 0.0,
    };
    if n.is_finite() { n } else { 0.0 }
}

fn non_empty_string(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(false) => None,
        other => Some(other.to_string()),
    }
}

/// Fill in missing fields and clamp the rest
pub fn normalize_row(raw: &Value) -> ScoreRecord {
    let empty = Map::new();
    let obj = raw.as_object().unwrap_or(&empty);

    let run_id = non_empty_string(obj.get("run_id")).unwrap_or_else(generate_run_id);
    let player_name = non_empty_string(obj.get("player_name"))
        .unwrap_or_else(|| ANONYMOUS.to_string())
        .chars()
        .take(MAX_NAME_CHARS)
        .collect();
    let score = obj.get("score").map(parse_score).unwrap_or(0.0);
    let played_at = non_empty_string(obj.get("played_at"))
        .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));
    let prize_group = match obj.get("prize_group") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    };
    let meta = match obj.get("meta") {
        Some(Value::Object(m)) => Value::Object(m.clone()),
        _ => Value::Object(Map::new()),
    };

    ScoreRecord {
        run_id,
        player_name,
        score,
        played_at,
        prize_group,
        meta,
    }
}

fn generate_run_id() -> String {
    let suffix: String = uuid::Uuid::new_v4().simple().to_string().chars().take(6).collect();
    format!("run-{}-{}", Utc::now().timestamp_millis(), suffix)
}
