//! Request/response front of the data directory
//!
//! Requests are JSON objects tagged by `op`; every request gets exactly one
//! response object. Used by the `serve` loop of the binary.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::configs::ConfigStore;
use super::scores::{ScoreFile, parse_score};
use crate::consts::LEADERBOARD_SIZE;
use crate::error::Result;
use crate::highscores::{LeaderboardEntry, ScoreLedger};

pub const SCORES_FILE: &str = "scores.jsonl";
pub const CONFIG_DIR: &str = "config";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Health,
    /// Append one score row; missing fields are filled in
    AddScore {
        #[serde(default)]
        score: Value,
    },
    Top10,
    Rank {
        #[serde(default)]
        score: Value,
    },
    GetConfig {
        slug: String,
    },
    SetConfig {
        slug: String,
        #[serde(default)]
        data: Value,
    },
}

/// Reply written back to the caller. Several variants share field sets
/// (`ok` plus one string), so the wire form is write-only and never parsed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Health { ok: bool, time: String },
    Saved { ok: bool, run_id: String },
    Top { data: Vec<LeaderboardEntry> },
    Rank { position: usize },
    Config { data: Value },
    ConfigSaved { ok: bool, slug: String },
    Error { ok: bool, error: String },
}

impl Response {
    pub fn error(msg: impl Into<String>) -> Self {
        Response::Error {
            ok: false,
            error: msg.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }
}

/// Score file plus config store rooted at one data directory
#[derive(Debug)]
pub struct DataService {
    root: PathBuf,
    scores: Arc<ScoreFile>,
    configs: ConfigStore,
}

impl DataService {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let scores = Arc::new(ScoreFile::open(root.join(SCORES_FILE))?);
        let configs = ConfigStore::open(root.join(CONFIG_DIR))?;
        log::info!("Data directory: {}", root.display());
        Ok(Self { root, scores, configs })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scores(&self) -> &ScoreFile {
        &self.scores
    }

    /// Score file as a shareable ledger for a [`crate::Game`]
    pub fn ledger(&self) -> Arc<dyn ScoreLedger> {
        self.scores.clone()
    }

    pub fn configs(&self) -> &ConfigStore {
        &self.configs
    }

    pub fn handle(&self, req: Request) -> Response {
        match self.try_handle(req) {
            Ok(resp) => resp,
            Err(e) => {
                log::warn!("Request failed: {}", e);
                Response::error(e.to_string())
            }
        }
    }

    fn try_handle(&self, req: Request) -> Result<Response> {
        Ok(match req {
            Request::Health => Response::Health {
                ok: true,
                time: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            },
            Request::AddScore { score } => {
                let row = self.scores.append_raw(&score)?;
                Response::Saved {
                    ok: true,
                    run_id: row.run_id,
                }
            }
            Request::Top10 => Response::Top {
                data: self.scores.top(LEADERBOARD_SIZE)?,
            },
            Request::Rank { score } => Response::Rank {
                position: self.scores.rank_for(parse_score(&score))?,
            },
            Request::GetConfig { slug } => Response::Config {
                data: self.configs.get(&slug)?,
            },
            Request::SetConfig { slug, data } => {
                let doc = self.configs.set(&slug, data)?;
                Response::ConfigSaved { ok: true, slug: doc.slug }
            }
        })
    }

    /// Handle one serialized request; malformed input becomes an error response
    pub fn handle_line(&self, line: &str) -> String {
        let resp = match serde_json::from_str::<Request>(line) {
            Ok(req) => self.handle(req),
            Err(e) => Response::error(format!("bad request: {e}")),
        };
        serde_json::to_string(&resp).unwrap_or_else(|e| format!("{{\"ok\":false,\"error\":\"{e}\"}}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_root(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("flappy-core-service-{}-{}", name, uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_request_tags() {
        let req: Request = serde_json::from_str(r#"{"op":"rank","score":"7"}"#).unwrap();
        assert_eq!(req, Request::Rank { score: json!("7") });
        let req: Request = serde_json::from_str(r#"{"op":"top10"}"#).unwrap();
        assert_eq!(req, Request::Top10);
    }

    #[test]
    fn test_rank_of_string_score() {
        let root = temp_root("rank");
        let svc = DataService::open(&root).unwrap();
        svc.handle(Request::AddScore { score: json!({ "score": 10 }) });
        svc.handle(Request::AddScore { score: json!({ "score": 3 }) });
        assert_eq!(svc.handle(Request::Rank { score: json!("5") }), Response::Rank { position: 2 });
        assert_eq!(svc.handle(Request::Rank { score: json!(null) }), Response::Rank { position: 3 });
        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn test_bad_input_is_an_error_response() {
        let root = temp_root("bad");
        let svc = DataService::open(&root).unwrap();
        let out: Value = serde_json::from_str(&svc.handle_line("not json")).unwrap();
        assert_eq!(out["ok"], json!(false));
        let resp = svc.handle(Request::GetConfig { slug: "a/b".to_string() });
        assert!(resp.is_error());
        let _ = std::fs::remove_dir_all(root);
    }
}
