//! Obstacle placement and spawn scheduling
//!
//! Spawns are scheduled by distance rather than a fixed interval: the time to
//! the next spawn is the desired spacing divided by the current speed, so pairs
//! stay evenly spaced on screen as the ramp speeds things up.

use rand::Rng;

use super::state::ObstaclePair;
use crate::clamp;
use crate::consts::{MIN_SPAWN_INTERVAL_MS, SPACING_BOARD_FRACTION, SPACING_PIPE_WIDTHS};
use crate::settings::Config;

/// Vertical layout of one pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub center: f32,
    pub gap: f32,
    pub pipe_height: f32,
    pub top_y: f32,
    pub bottom_y: f32,
}

/// Desired horizontal distance between consecutive pairs
pub fn spacing(cfg: &Config) -> f32 {
    cfg.pipes.min_horizontal_spacing_px.unwrap_or_else(|| {
        (cfg.board.width * SPACING_BOARD_FRACTION).max(cfg.pipes.width * SPACING_PIPE_WIDTHS)
    })
}

/// Milliseconds until the next spawn at `px_per_sec`
pub fn spawn_interval_ms(cfg: &Config, px_per_sec: f32) -> f64 {
    let px_per_sec = px_per_sec.abs().max(1.0) as f64;
    let ms = (spacing(cfg) as f64 / px_per_sec * 1000.0).round();
    ms.max(MIN_SPAWN_INTERVAL_MS)
}

/// Pick the vertical layout of a pair with opening `gap`.
///
/// `prev_center` is the previous pair's gap center; it only matters when
/// `pipes.maxCenterShiftPercent` is set.
pub fn place_pair<R: Rng + ?Sized>(
    cfg: &Config,
    gap: f32,
    prev_center: Option<f32>,
    rng: &mut R,
) -> Placement {
    let p = &cfg.pipes;
    let height = cfg.board.height;
    let half = gap / 2.0;

    let usable = (height - gap).max(0.0);
    let base_off = clamp(p.random_base_percent, 0.0, 100.0) / 100.0 * usable;
    let range_off = clamp(p.random_range_percent, 0.0, 100.0) / 100.0 * usable;
    let margin = p.edge_overflow_px.max(0.0);

    let mut center = half + base_off + rng.random::<f32>() * range_off;
    if let (Some(prev), Some(pct)) = (prev_center, p.max_center_shift_percent) {
        let shift = height * pct / 100.0;
        center = clamp(center, prev - shift, prev + shift);
    }
    center = clamp(center, half - margin, height - half + margin);

    let mut pipe_height = p.height;
    if p.auto_stretch_to_edges {
        let need_top = (center - half + margin).ceil();
        let need_bottom = (height - (center + half) + margin).ceil();
        pipe_height = pipe_height.max(need_top).max(need_bottom);
    }

    Placement {
        center,
        gap,
        pipe_height,
        top_y: center - half - pipe_height,
        bottom_y: center + half,
    }
}

/// New pair at the right edge of the board
pub fn spawn_pair<R: Rng + ?Sized>(
    cfg: &Config,
    id: u32,
    gap: f32,
    prev_center: Option<f32>,
    rng: &mut R,
) -> ObstaclePair {
    let placement = place_pair(cfg, gap, prev_center, rng);
    log::debug!(
        "Spawn pair {} center={:.1} gap={:.1} h={:.0}",
        id,
        placement.center,
        placement.gap,
        placement.pipe_height
    );
    ObstaclePair::new(id, cfg.board.width, cfg.pipes.width, placement)
}
