//! Flappy Core - simulation core of a side-scrolling pipe-dodging arcade game
//!
//! Core modules:
//! - `sim`: Frame-driven simulation (physics, difficulty, spawning, collision, run state)
//! - `render`: Draw list built from the simulation state each frame
//! - `platform`: Frame clock
//! - `game`: Controller owning the simulation, assets and the score ledger
//! - `settings`: Data-driven tuning merged from a remote JSON document
//! - `highscores`: Score records, ledger trait, prize groups
//! - `persistence`: Local score/config service backed by plain files

pub mod error;
pub mod game;
pub mod highscores;
pub mod persistence;
pub mod platform;
pub mod render;
pub mod settings;
pub mod sim;

pub use error::{Error, Result};
pub use game::{DecodedSprites, Game, GameOverView, RankDisplay};
pub use sim::Assets;
pub use highscores::{HighScores, LeaderboardEntry, ScoreLedger, ScoreRecord};
pub use settings::{Config, ConfigSource};

/// Engine constants that are not part of the tunable config
pub mod consts {
    /// Reference frame interval all per-frame tuning values are expressed in (60 Hz)
    pub const REFERENCE_FRAME_MS: f32 = 16.667;
    /// Frames per second implied by the reference interval
    pub const REFERENCE_FPS: f32 = 60.0;
    /// Longest step a single frame may advance the simulation by
    pub const MAX_FRAME_DT_MS: f64 = 50.0;

    /// Design board the default tuning is authored for
    pub const DESIGN_BOARD_WIDTH: f32 = 360.0;
    pub const DESIGN_BOARD_HEIGHT: f32 = 640.0;

    /// Spawn intervals never go below this
    pub const MIN_SPAWN_INTERVAL_MS: f64 = 120.0;
    /// Fallback spacing when no explicit spacing is configured
    pub const SPACING_BOARD_FRACTION: f32 = 0.48;
    pub const SPACING_PIPE_WIDTHS: f32 = 2.2;

    /// The dying body must fall at least this far past the floor before the run ends
    pub const MIN_EXIT_MARGIN: f32 = 16.0;

    /// Bodies shorter than this fraction of the board height get resized at boot
    pub const AUTO_BIRD_TRIGGER_FRACTION: f32 = 0.04;
    /// Height the automatic resize picks, as a percentage of board height
    pub const MIN_AUTO_BIRD_PERCENT: f32 = 6.0;
    /// Body aspect ratio used when no frame decoded
    pub const DEFAULT_BIRD_ASPECT: f32 = 34.0 / 24.0;

    /// Floor for the legacy spawn interval
    pub const MIN_LEGACY_SPAWN_INTERVAL_MS: f64 = 50.0;

    /// Rows shown by the leaderboard
    pub const LEADERBOARD_SIZE: usize = 10;
}

/// Clamp without panicking when the bounds cross (the lower bound wins)
#[inline]
pub fn clamp(v: f32, min: f32, max: f32) -> f32 {
    v.min(max).max(min)
}

#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
pub fn deg_to_rad(deg: f32) -> f32 {
    deg * std::f32::consts::PI / 180.0
}

/// Linearly map `v` from `[in_min, in_max]` onto `[out_min, out_max]`, clamped to the output range
#[inline]
pub fn map_range_clamped(v: f32, in_min: f32, in_max: f32, out_min: f32, out_max: f32) -> f32 {
    if in_max == in_min {
        return out_min;
    }
    let t = clamp((v - in_min) / (in_max - in_min), 0.0, 1.0);
    out_min + t * (out_max - out_min)
}

/// Format a fractional score the way the HUD shows it (`3`, `3.5`)
pub fn format_score(score: f64) -> String {
    if score.fract() == 0.0 {
        format!("{}", score as i64)
    } else {
        let s = format!("{:.3}", score);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_crossed_bounds() {
        assert_eq!(clamp(5.0, 10.0, 0.0), 10.0);
        assert_eq!(clamp(5.0, 0.0, 10.0), 5.0);
        assert_eq!(clamp(-1.0, 0.0, 10.0), 0.0);
    }

    #[test]
    fn test_map_range_clamped() {
        assert_eq!(map_range_clamped(0.0, -6.0, 12.0, -25.0, 70.0), -25.0 + (6.0 / 18.0) * 95.0);
        assert_eq!(map_range_clamped(-100.0, -6.0, 12.0, -25.0, 70.0), -25.0);
        assert_eq!(map_range_clamped(100.0, -6.0, 12.0, -25.0, 70.0), 70.0);
        assert_eq!(map_range_clamped(3.0, 1.0, 1.0, 7.0, 9.0), 7.0);
    }

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(0.0), "0");
        assert_eq!(format_score(3.0), "3");
        assert_eq!(format_score(3.5), "3.5");
        assert_eq!(format_score(0.25), "0.25");
    }
}
