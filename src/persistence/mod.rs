//! Local score/config service backed by plain files
//!
//! Layout of a data directory:
//! - `scores.jsonl`: one score row per line, append-only
//! - `config/<slug>.json`: tuning document per slug, replaced atomically

pub mod configs;
pub mod scores;
pub mod service;

pub use configs::{ConfigDocument, ConfigStore, validate_slug};
pub use scores::{ScoreFile, normalize_row};
pub use service::{DataService, Request, Response};
