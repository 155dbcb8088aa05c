//! Library error type

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Config slugs become file names, so only `[A-Za-z0-9_-]` is accepted
    #[error("invalid config slug {0:?}")]
    InvalidSlug(String),

    #[error("invalid sprite: {0}")]
    InvalidSprite(String),

    #[error("score ledger unavailable: {0}")]
    Ledger(String),
}

pub type Result<T> = std::result::Result<T, Error>;
