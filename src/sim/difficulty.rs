//! Difficulty ramps
//!
//! Pure functions of active play time and score. Speeds are in units per
//! reference frame; the spawner and background use the px/sec form.

use crate::consts::REFERENCE_FPS;
use crate::settings::{Config, DifficultyConfig};

/// Stepwise extra speed: `stepAdd` every `stepEvery`, capped
pub fn step_extra(d: &DifficultyConfig, active_ms: f64) -> f32 {
    if d.step_every_ms <= 0.0 {
        return 0.0;
    }
    let steps = (active_ms.max(0.0) / d.step_every_ms).floor() as f32;
    (steps * d.step_add_px_per_frame).min(d.step_max_extra_px_per_frame)
}

/// Score-linear extra speed, zero unless the score ramp is on
pub fn score_extra(d: &DifficultyConfig, score: f64) -> f32 {
    if !d.ramp_enabled {
        return 0.0;
    }
    d.speed_per_score * score.max(0.0) as f32
}

/// Time-linear extra speed, capped
pub fn time_extra(d: &DifficultyConfig, active_ms: f64) -> f32 {
    if !d.time_ramp_enabled {
        return 0.0;
    }
    let sec = (active_ms.max(0.0) / 1000.0) as f32;
    (d.time_speed_per_sec * sec).min(d.time_max_extra_speed)
}

/// Absolute scroll speed in units per reference frame
pub fn scroll_speed(cfg: &Config, active_ms: f64, score: f64) -> f32 {
    let d = &cfg.difficulty;
    cfg.pipes.scroll_speed.abs()
        + step_extra(d, active_ms)
        + score_extra(d, score)
        + time_extra(d, active_ms)
}

/// Absolute scroll speed in px/sec
pub fn scroll_speed_px_per_sec(cfg: &Config, active_ms: f64, score: f64) -> f32 {
    scroll_speed(cfg, active_ms, score) * REFERENCE_FPS
}

/// Gap percentage after both ramps, never below the configured minimum
pub fn gap_percent(cfg: &Config, active_ms: f64, score: f64) -> f32 {
    let d = &cfg.difficulty;
    let mut pct = cfg.pipes.gap_percent;
    if d.ramp_enabled {
        pct -= d.gap_step_per_score * score.max(0.0) as f32;
    }
    if d.time_ramp_enabled {
        pct -= d.time_gap_step_per_sec * (active_ms.max(0.0) / 1000.0) as f32;
    }
    pct.max(d.min_gap_percent)
}

/// Gap size in world units
pub fn gap_size(cfg: &Config, active_ms: f64, score: f64) -> f32 {
    cfg.gap_for_percent(gap_percent(cfg, active_ms, score))
}

/// Difficulty evaluated once per frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Difficulty {
    /// Units per reference frame
    pub speed: f32,
    pub px_per_sec: f32,
    pub gap_percent: f32,
    pub gap: f32,
}

impl Difficulty {
    pub fn evaluate(cfg: &Config, active_ms: f64, score: f64) -> Self {
        let speed = scroll_speed(cfg, active_ms, score);
        let gap_percent = gap_percent(cfg, active_ms, score);
        Self {
            speed,
            px_per_sec: speed * REFERENCE_FPS,
            gap_percent,
            gap: cfg.gap_for_percent(gap_percent),
        }
    }
}
