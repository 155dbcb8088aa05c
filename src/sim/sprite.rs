//! Decoded sprites and pipe alpha masks
//!
//! Decoding happens outside the core; sprites arrive as raw RGBA8 buffers.
//! Pipe masks are rasterized once at the pipe design resolution and shared by
//! every pair that uses the same sprite.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::settings::Config;

/// Decoded RGBA8 image
#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    width: u32,
    height: u32,
    pixels: Vec<[u8; 4]>,
}

impl Sprite {
    /// Wrap a tightly packed RGBA8 buffer
    pub fn from_rgba(width: u32, height: u32, bytes: &[u8]) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidSprite(format!("empty sprite {width}x{height}")));
        }
        let expected = width as usize * height as usize * 4;
        if bytes.len() != expected {
            return Err(Error::InvalidSprite(format!(
                "{width}x{height} sprite needs {expected} bytes, got {}",
                bytes.len()
            )));
        }
        let pixels: &[[u8; 4]] = bytemuck::try_cast_slice(bytes)
            .map_err(|e| Error::InvalidSprite(format!("{e:?}")))?;
        Ok(Self {
            width,
            height,
            pixels: pixels.to_vec(),
        })
    }

    /// Sprite of one solid color
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            pixels: vec![rgba; width as usize * height as usize],
        }
    }

    /// Sprite whose pixels come from `f(x, y)`
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> [u8; 4]) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    #[inline]
    pub fn alpha_at(&self, x: u32, y: u32) -> u8 {
        self.pixels[(y * self.width + x) as usize][3]
    }

    /// Nearest-neighbor alpha at normalized coordinates; 0 outside `[0, 1)`
    #[inline]
    pub fn sample_alpha(&self, u: f32, v: f32) -> u8 {
        if !(0.0..1.0).contains(&u) || !(0.0..1.0).contains(&v) {
            return 0;
        }
        let x = ((u * self.width as f32) as u32).min(self.width - 1);
        let y = ((v * self.height as f32) as u32).min(self.height - 1);
        self.alpha_at(x, y)
    }
}

/// Opacity bits of a pipe sprite at the pipe design resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlphaMask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl AlphaMask {
    /// Resample `sprite` to `width × height` (nearest neighbor) and keep the
    /// pixels whose alpha is strictly above `threshold`.
    pub fn build(sprite: &Sprite, width: u32, height: u32, threshold: f32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self::from_fn(width, height, |x, y| {
            let u = (x as f32 + 0.5) / width as f32;
            let v = (y as f32 + 0.5) / height as f32;
            sprite.sample_alpha(u, v) as f32 > threshold
        })
    }

    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> bool) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let mut bits = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                bits.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            bits,
        }
    }

    pub fn opaque(width: u32, height: u32) -> Self {
        Self::from_fn(width, height, |_, _| true)
    }

    pub fn transparent(width: u32, height: u32) -> Self {
        Self::from_fn(width, height, |_, _| false)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.bits[(y * self.width + x) as usize]
    }

    pub fn opaque_count(&self) -> usize {
        self.bits.iter().filter(|b| **b).count()
    }
}

/// Which sprite an obstacle half uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipeKind {
    Top,
    Bottom,
}

/// Everything the simulation needs from decoded assets. Any piece may be
/// missing; missing pieces degrade to placeholders and the inset fallback.
#[derive(Debug, Clone, Default)]
pub struct Assets {
    pub body_frames: Vec<Arc<Sprite>>,
    pub top_pipe: Option<Arc<Sprite>>,
    pub bottom_pipe: Option<Arc<Sprite>>,
    pub top_mask: Option<Arc<AlphaMask>>,
    pub bottom_mask: Option<Arc<AlphaMask>>,
    pub background: Option<Arc<Sprite>>,
}

impl Assets {
    /// Build masks and drop failed loads. `None` entries are load failures.
    pub fn build(
        cfg: &Config,
        body_frames: Vec<Option<Sprite>>,
        top_pipe: Option<Sprite>,
        bottom_pipe: Option<Sprite>,
        background: Option<Sprite>,
    ) -> Self {
        let total = body_frames.len();
        let body_frames: Vec<Arc<Sprite>> = body_frames.into_iter().flatten().map(Arc::new).collect();
        if body_frames.len() < total {
            log::warn!("{} of {} body frames failed to load", total - body_frames.len(), total);
        }

        let mask_w = cfg.pipes.width.round().max(1.0) as u32;
        let mask_h = cfg.pipes.height.round().max(1.0) as u32;
        let threshold = cfg.collision.pipe_alpha_threshold;
        let build_mask = |sprite: &Option<Sprite>, kind: PipeKind| match sprite {
            Some(s) => Some(Arc::new(AlphaMask::build(s, mask_w, mask_h, threshold))),
            None => {
                log::warn!("{:?} pipe sprite missing, collision falls back to inset boxes", kind);
                None
            }
        };
        let top_mask = build_mask(&top_pipe, PipeKind::Top);
        let bottom_mask = build_mask(&bottom_pipe, PipeKind::Bottom);

        if background.is_none() {
            log::warn!("Background sprite missing, using flat fill");
        }

        Self {
            body_frames,
            top_pipe: top_pipe.map(Arc::new),
            bottom_pipe: bottom_pipe.map(Arc::new),
            top_mask,
            bottom_mask,
            background: background.map(Arc::new),
        }
    }

    pub fn mask(&self, kind: PipeKind) -> Option<&AlphaMask> {
        match kind {
            PipeKind::Top => self.top_mask.as_deref(),
            PipeKind::Bottom => self.bottom_mask.as_deref(),
        }
    }

    pub fn pipe_sprite(&self, kind: PipeKind) -> Option<&Sprite> {
        match kind {
            PipeKind::Top => self.top_pipe.as_deref(),
            PipeKind::Bottom => self.bottom_pipe.as_deref(),
        }
    }

    /// Frame `index`, or the first available frame
    pub fn body_frame(&self, index: usize) -> Option<&Sprite> {
        self.body_frames
            .get(index)
            .or_else(|| self.body_frames.first())
            .map(|s| s.as_ref())
    }
}
