//! Axis-aligned rectangles in world units

use glam::Vec2;

/// Axis-aligned rectangle, `(x, y)` is the top-left corner (y grows downward)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    #[inline]
    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    /// Shrink by `amount` on every side
    pub fn inset(&self, amount: f32) -> Rect {
        Rect::new(
            self.x + amount,
            self.y + amount,
            self.w - amount * 2.0,
            self.h - amount * 2.0,
        )
    }

    /// Strict overlap test; touching edges do not count
    #[inline]
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }

    /// Intersection in world units, `None` when empty
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());
        (x2 > x1 && y2 > y1).then(|| Rect::new(x1, y1, x2 - x1, y2 - y1))
    }
}

/// Integer pixel rectangle covering every pixel a world rectangle touches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
}

impl PixelRect {
    /// Smallest pixel-aligned rectangle containing `r`
    pub fn covering(r: &Rect) -> Self {
        let x1 = r.x.floor() as i32;
        let y1 = r.y.floor() as i32;
        let x2 = r.right().ceil() as i32;
        let y2 = r.bottom().ceil() as i32;
        Self {
            x: x1,
            y: y1,
            w: (x2 - x1).max(0) as u32,
            h: (y2 - y1).max(0) as u32,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    pub fn area(&self) -> usize {
        self.w as usize * self.h as usize
    }

    /// World coordinate of the center of local pixel `(px, py)`
    #[inline]
    pub fn pixel_center(&self, px: u32, py: u32) -> Vec2 {
        Vec2::new(
            self.x as f32 + px as f32 + 0.5,
            self.y as f32 + py as f32 + 0.5,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intersects_edges_do_not_touch() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(!a.intersects(&Rect::new(10.0, 0.0, 5.0, 5.0)));
        assert!(a.intersects(&Rect::new(9.5, 9.5, 5.0, 5.0)));
    }

    #[test]
    fn test_intersection() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 2.0, 10.0, 4.0);
        assert_eq!(a.intersection(&b), Some(Rect::new(5.0, 2.0, 5.0, 4.0)));
        assert_eq!(a.intersection(&Rect::new(20.0, 0.0, 1.0, 1.0)), None);
    }

    #[test]
    fn test_covering_rounds_outward() {
        let px = PixelRect::covering(&Rect::new(10.7, 3.2, 1.0, 0.5));
        assert_eq!(px, PixelRect { x: 10, y: 3, w: 2, h: 1 });
        assert_eq!(px.pixel_center(1, 0), Vec2::new(11.5, 3.5));
    }

    #[test]
    fn test_inset() {
        let r = Rect::new(0.0, 0.0, 34.0, 24.0).inset(2.0);
        assert_eq!(r, Rect::new(2.0, 2.0, 30.0, 20.0));
    }
}
