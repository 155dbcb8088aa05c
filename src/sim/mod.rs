//! Frame-driven simulation module
//!
//! All gameplay logic lives here. This module stays free of I/O:
//! - One `step` per frame, delta capped by the caller
//! - Seeded RNG only
//! - Pairs kept oldest first
//! - No rendering or platform dependencies

pub mod background;
pub mod collision;
pub mod difficulty;
pub mod physics;
pub mod rect;
pub mod spawner;
pub mod sprite;
pub mod state;
pub mod tick;

pub use background::BackgroundScroll;
pub use collision::{AlphaBuffer, body_hits_pair, broad_phase, narrow_phase, rasterize_rotated};
pub use difficulty::Difficulty;
pub use rect::{PixelRect, Rect};
pub use sprite::{AlphaMask, Assets, PipeKind, Sprite};
pub use state::{
    Body, DeathCause, DeathState, GameEvent, ObstaclePair, RunEvent, RunPhase, RunState,
    SimulationState,
};
pub use tick::{TickInput, restart, step};
