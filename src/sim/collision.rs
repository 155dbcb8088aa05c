//! Body vs obstacle collision
//!
//! The body sprite rotates continuously with its tilt, so a fixed hitbox is
//! both too generous and too strict. Collision runs in two stages:
//!
//! 1. Broad phase: padded body box against the pipe box.
//! 2. Narrow phase: the rotated body frame is rasterized over the overlap
//!    rectangle and every opaque pixel is looked up in the pipe's alpha mask.
//!
//! Rasterization is passed in as a callback so the narrow phase can be driven
//! by synthetic buffers in tests or by a GPU readback in a real frontend.

use glam::{Mat2, Vec2};

use super::rect::{PixelRect, Rect};
use super::sprite::{AlphaMask, Assets, PipeKind, Sprite};
use super::state::{Body, ObstaclePair};
use crate::deg_to_rad;
use crate::settings::CollisionConfig;

/// Alpha coverage of a pixel rectangle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlphaBuffer {
    width: u32,
    height: u32,
    alpha: Vec<u8>,
}

impl AlphaBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            alpha: vec![0; width as usize * height as usize],
        }
    }

    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> u8) -> Self {
        let mut alpha = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                alpha.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            alpha,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Alpha at `(x, y)`; 0 outside the buffer
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u8 {
        if x < self.width && y < self.height {
            self.alpha[(y * self.width + x) as usize]
        } else {
            0
        }
    }
}

/// Rasterize `sprite`, drawn into `dest` and rotated by `angle_deg` around the
/// center of `dest`, over the pixels of `area`.
///
/// Each pixel center is rotated back into sprite space and sampled
/// nearest-neighbor.
pub fn rasterize_rotated(sprite: &Sprite, dest: &Rect, angle_deg: f32, area: PixelRect) -> AlphaBuffer {
    if dest.w <= 0.0 || dest.h <= 0.0 {
        return AlphaBuffer::new(area.w, area.h);
    }
    let center = dest.center();
    let inverse = Mat2::from_angle(-deg_to_rad(angle_deg));
    let half = Vec2::new(dest.w, dest.h) / 2.0;

    AlphaBuffer::from_fn(area.w, area.h, |px, py| {
        let local = inverse * (area.pixel_center(px, py) - center) + half;
        sprite.sample_alpha(local.x / dest.w, local.y / dest.h)
    })
}

/// Padded body box against the pipe box
#[inline]
pub fn broad_phase(hitbox: &Rect, pipe: &Rect) -> bool {
    hitbox.intersects(pipe)
}

/// Pixel test over the overlap of `hitbox` and `pipe`.
///
/// `rasterize` returns the body's alpha over the given pixel rectangle. Body
/// pixels with alpha above `alpha_threshold` are mapped into mask space (the
/// mask is built at the pipe's design size, the pipe may be drawn larger).
pub fn narrow_phase<F>(
    hitbox: &Rect,
    pipe: &Rect,
    mask: &AlphaMask,
    alpha_threshold: f32,
    rasterize: F,
) -> bool
where
    F: FnOnce(PixelRect) -> AlphaBuffer,
{
    let Some(overlap) = hitbox.intersection(pipe) else {
        return false;
    };
    let area = PixelRect::covering(&overlap);
    if area.is_empty() || pipe.w <= 0.0 || pipe.h <= 0.0 {
        return false;
    }

    let body = rasterize(area);
    let sx = mask.width() as f32 / pipe.w;
    let sy = mask.height() as f32 / pipe.h;
    let (mw, mh) = (mask.width() as f32, mask.height() as f32);

    for py in 0..area.h {
        for px in 0..area.w {
            if body.get(px, py) as f32 <= alpha_threshold {
                continue;
            }
            let world = area.pixel_center(px, py);
            if !overlap_contains(&overlap, world) {
                continue;
            }
            let mx = (world.x - pipe.x) * sx;
            let my = (world.y - pipe.y) * sy;
            if mx < 0.0 || my < 0.0 || mx >= mw || my >= mh {
                continue;
            }
            if mask.get(mx as u32, my as u32) {
                return true;
            }
        }
    }
    false
}

#[inline]
fn overlap_contains(r: &Rect, p: Vec2) -> bool {
    p.x >= r.x && p.x < r.right() && p.y >= r.y && p.y < r.bottom()
}

/// Box test against the pipe shrunk by `inset`, used when no mask is available
pub fn inset_overlap(hitbox: &Rect, pipe: &Rect, inset: f32) -> bool {
    hitbox.intersects(&pipe.inset(inset.max(0.0).floor()))
}

/// Full test of the body against one half of a pair
pub fn body_hits_pipe(
    cfg: &CollisionConfig,
    assets: &Assets,
    body: &Body,
    pair: &ObstaclePair,
    kind: PipeKind,
) -> bool {
    let hitbox = body.hitbox();
    let pipe = pair.rect(kind);
    if !broad_phase(&hitbox, &pipe) {
        return false;
    }
    if !cfg.bird_pixel_perfect {
        return true;
    }
    match (assets.mask(kind), assets.body_frame(body.frame)) {
        (Some(mask), Some(sprite)) => {
            narrow_phase(&hitbox, &pipe, mask, cfg.alpha_threshold, |area| {
                rasterize_rotated(sprite, &body.rect(), body.tilt_deg, area)
            })
        }
        _ => inset_overlap(&hitbox, &pipe, cfg.pipe_fallback_inset_px),
    }
}

/// Test the body against both halves of a pair
pub fn body_hits_pair(cfg: &CollisionConfig, assets: &Assets, body: &Body, pair: &ObstaclePair) -> bool {
    body_hits_pipe(cfg, assets, body, pair, PipeKind::Top)
        || body_hits_pipe(cfg, assets, body, pair, PipeKind::Bottom)
}
