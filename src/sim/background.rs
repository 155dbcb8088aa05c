//! Parallax background scroll
//!
//! Cosmetic only. Follows the pipe speed (or a fixed speed) and freezes with
//! the rest of the world during the death sequence.

use crate::settings::BackgroundConfig;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BackgroundScroll {
    /// Accumulated scroll in px
    pub scroll_x: f64,
    pub frozen: bool,
}

/// Background speed in px/sec for a given pipe speed
pub fn background_px_per_sec(bg: &BackgroundConfig, pipe_px_per_sec: f32) -> f32 {
    if bg.fixed_px_per_sec > 0.0 {
        bg.fixed_px_per_sec
    } else {
        pipe_px_per_sec * bg.parallax_factor
    }
}

impl BackgroundScroll {
    pub fn advance(&mut self, px_per_sec: f32, dt_ms: f64) {
        if self.frozen {
            return;
        }
        let next = self.scroll_x + px_per_sec as f64 * dt_ms.max(0.0) / 1000.0;
        self.scroll_x = if next.is_finite() { next } else { 0.0 };
    }

    /// Left edge of the first tile; a second tile is drawn at `offset + draw_width`
    pub fn tile_offset(&self, draw_width: f32) -> f32 {
        if draw_width <= 0.0 {
            return 0.0;
        }
        -(self.scroll_x % draw_width as f64).floor() as f32
    }
}

/// Width of one tile when the image is scaled to the board height
pub fn tile_width(image_w: u32, image_h: u32, board_h: f32) -> f32 {
    if image_h == 0 {
        return 0.0;
    }
    (image_w as f32 * board_h / image_h as f32).ceil()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speed_source() {
        let mut bg = BackgroundConfig::default();
        assert_eq!(background_px_per_sec(&bg, 120.0), 60.0);
        bg.fixed_px_per_sec = 30.0;
        assert_eq!(background_px_per_sec(&bg, 120.0), 30.0);
    }

    #[test]
    fn test_advance_and_freeze() {
        let mut scroll = BackgroundScroll::default();
        scroll.advance(60.0, 500.0);
        assert_eq!(scroll.scroll_x, 30.0);
        scroll.frozen = true;
        scroll.advance(60.0, 500.0);
        assert_eq!(scroll.scroll_x, 30.0);
    }

    #[test]
    fn test_tile_offset_wraps() {
        let scroll = BackgroundScroll {
            scroll_x: 410.5,
            frozen: false,
        };
        assert_eq!(scroll.tile_offset(400.0), -10.0);
        assert_eq!(tile_width(288, 512, 640.0), 360.0);
    }
}
