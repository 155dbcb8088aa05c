//! Draw list built from the simulation state
//!
//! A frontend walks `Scene::quads` in order and binds the referenced sprite,
//! or uses the flat color when the sprite failed to load.

use glam::{Mat2, Vec2};

use super::vertex::{Vertex, colors, parse_hex_color};
use crate::format_score;
use crate::settings::Config;
use crate::sim::background::tile_width;
use crate::sim::{Assets, PipeKind, Rect, RunPhase, SimulationState};

/// Texture a quad samples from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpriteRef {
    Background,
    Pipe(PipeKind),
    /// Body animation frame
    Body(usize),
    /// No texture, flat color only
    Fill,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Quad {
    pub sprite: SpriteRef,
    pub rect: Rect,
    /// Clockwise rotation around the rect center
    pub angle_deg: f32,
    pub color: [f32; 4],
}

impl Quad {
    fn fill(rect: Rect, color: [f32; 4]) -> Self {
        Self {
            sprite: SpriteRef::Fill,
            rect,
            angle_deg: 0.0,
            color,
        }
    }

    /// Two triangles, corners rotated around the center
    pub fn vertices(&self) -> [Vertex; 6] {
        let c = self.rect.center();
        let half = Vec2::new(self.rect.w, self.rect.h) / 2.0;
        let rot = Mat2::from_angle(crate::deg_to_rad(self.angle_deg));
        let corner = |sx: f32, sy: f32| {
            let p = c + rot * Vec2::new(sx * half.x, sy * half.y);
            Vertex::new(p.x, p.y, (sx + 1.0) / 2.0, (sy + 1.0) / 2.0, self.color)
        };
        let tl = corner(-1.0, -1.0);
        let tr = corner(1.0, -1.0);
        let bl = corner(-1.0, 1.0);
        let br = corner(1.0, 1.0);
        [tl, bl, tr, tr, bl, br]
    }
}

/// Everything needed to draw one frame
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub width: f32,
    pub height: f32,
    pub quads: Vec<Quad>,
    /// Full-screen flash color with its current opacity
    pub flash: Option<[f32; 4]>,
    pub paused_overlay: bool,
    pub score_text: String,
}

impl Scene {
    /// Flattened vertex list for a single draw call per sprite batch
    pub fn vertices(&self) -> Vec<Vertex> {
        self.quads.iter().flat_map(|q| q.vertices()).collect()
    }
}

/// Build the draw list for the current state at `now_ms`
pub fn build_scene(state: &SimulationState, cfg: &Config, assets: &Assets, now_ms: f64) -> Scene {
    let (w, h) = (cfg.board.width, cfg.board.height);
    let mut quads = Vec::with_capacity(state.pipes.len() * 2 + 3);

    match assets.background.as_deref() {
        Some(bg) => {
            let tile = tile_width(bg.width(), bg.height(), h);
            let x = state.background.tile_offset(tile);
            for tx in [x, x + tile] {
                quads.push(Quad {
                    sprite: SpriteRef::Background,
                    rect: Rect::new(tx, 0.0, tile, h),
                    angle_deg: 0.0,
                    color: colors::WHITE,
                });
            }
        }
        None => {
            let fill = parse_hex_color(&cfg.board.background).unwrap_or([0.0, 0.0, 0.0, 1.0]);
            quads.push(Quad::fill(Rect::new(0.0, 0.0, w, h), fill));
        }
    }

    for pair in &state.pipes {
        for kind in [PipeKind::Top, PipeKind::Bottom] {
            let (sprite, color) = match assets.pipe_sprite(kind) {
                Some(_) => (SpriteRef::Pipe(kind), colors::WHITE),
                None => (SpriteRef::Fill, colors::PIPE),
            };
            quads.push(Quad {
                sprite,
                rect: pair.rect(kind),
                angle_deg: 0.0,
                color,
            });
        }
    }

    let body = &state.body;
    let (sprite, color) = if assets.body_frames.is_empty() {
        (SpriteRef::Fill, colors::BODY)
    } else {
        let frame = if body.frame < assets.body_frames.len() { body.frame } else { 0 };
        (SpriteRef::Body(frame), colors::WHITE)
    };
    quads.push(Quad {
        sprite,
        rect: body.rect(),
        angle_deg: body.tilt_deg,
        color,
    });

    let flash = state.death.and_then(|death| {
        let alpha = death.flash_alpha(now_ms);
        (alpha > 0.0).then(|| {
            let mut c = parse_hex_color(&cfg.death.flash_color).unwrap_or(colors::WHITE);
            c[3] *= alpha;
            c
        })
    });

    let paused_overlay = state.paused && state.phase.is_pausable() && state.phase != RunPhase::Idle;
    if paused_overlay {
        quads.push(Quad::fill(Rect::new(0.0, 0.0, w, h), colors::PAUSE_OVERLAY));
    }

    Scene {
        width: w,
        height: h,
        quads,
        flash,
        paused_overlay,
        score_text: format_score(state.run.score),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{DeathCause, DeathState, Sprite};
    use std::sync::Arc;

    #[test]
    fn test_placeholders_without_assets() {
        let cfg = Config::default();
        let state = SimulationState::new(&cfg, 1, 1);
        let scene = build_scene(&state, &cfg, &Assets::default(), 0.0);
        assert_eq!(scene.quads.len(), 2);
        assert_eq!(scene.quads[0].sprite, SpriteRef::Fill);
        assert_eq!(scene.quads[1].color, colors::BODY);
        assert_eq!(scene.score_text, "0");
        assert_eq!(scene.vertices().len(), 12);
    }

    #[test]
    fn test_background_tiles() {
        let cfg = Config::default();
        let mut state = SimulationState::new(&cfg, 1, 1);
        state.background.scroll_x = 100.0;
        let assets = Assets {
            background: Some(Arc::new(Sprite::filled(288, 512, [0; 4]))),
            ..Default::default()
        };
        let scene = build_scene(&state, &cfg, &assets, 0.0);
        assert_eq!(scene.quads[0].rect.x, -100.0);
        assert_eq!(scene.quads[1].rect.x, 260.0);
    }

    #[test]
    fn test_flash_fades() {
        let cfg = Config::default();
        let mut state = SimulationState::new(&cfg, 1, 1);
        state.phase = RunPhase::Dying;
        state.death = Some(DeathState::start(&cfg, &state.body, DeathCause::Collision, 0.0));
        let early = build_scene(&state, &cfg, &Assets::default(), 35.0);
        assert_eq!(early.flash.map(|c| c[3]), Some(0.75));
        let late = build_scene(&state, &cfg, &Assets::default(), 200.0);
        assert_eq!(late.flash, None);
    }

    #[test]
    fn test_rotated_quad_keeps_center() {
        let quad = Quad {
            sprite: SpriteRef::Body(0),
            rect: Rect::new(0.0, 0.0, 34.0, 24.0),
            angle_deg: 45.0,
            color: colors::WHITE,
        };
        let v = quad.vertices();
        let cx = (v[0].position[0] + v[5].position[0]) / 2.0;
        let cy = (v[0].position[1] + v[5].position[1]) / 2.0;
        assert!((cx - 17.0).abs() < 1e-4 && (cy - 12.0).abs() < 1e-4);
    }
}
