//! Vertex types for textured 2D quads

use bytemuck::{Pod, Zeroable};

/// 2D vertex with position, texture coordinate and tint
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
    pub color: [f32; 4],
}

impl Vertex {
    pub const fn new(x: f32, y: f32, u: f32, v: f32, color: [f32; 4]) -> Self {
        Self {
            position: [x, y],
            uv: [u, v],
            color,
        }
    }
}

/// Placeholder colors for missing sprites
pub mod colors {
    pub const WHITE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];
    pub const BODY: [f32; 4] = [0.984, 0.749, 0.141, 1.0];
    pub const PIPE: [f32; 4] = [0.204, 0.659, 0.325, 1.0];
    pub const PAUSE_OVERLAY: [f32; 4] = [0.0, 0.0, 0.0, 0.333];
}

/// Parse `#rgb`, `#rrggbb` or `#rrggbbaa`; `None` for anything else
pub fn parse_hex_color(s: &str) -> Option<[f32; 4]> {
    let hex = s.trim().strip_prefix('#')?;
    let digits: Vec<u8> = hex
        .chars()
        .map(|c| c.to_digit(16).map(|d| d as u8))
        .collect::<Option<_>>()?;
    let bytes: Vec<u8> = match digits.len() {
        3 => digits.iter().map(|d| d * 17).chain([255]).collect(),
        6 | 8 => {
            let mut v: Vec<u8> = digits.chunks(2).map(|p| p[0] * 16 + p[1]).collect();
            if v.len() == 3 {
                v.push(255);
            }
            v
        }
        _ => return None,
    };
    Some([
        bytes[0] as f32 / 255.0,
        bytes[1] as f32 / 255.0,
        bytes[2] as f32 / 255.0,
        bytes[3] as f32 / 255.0,
    ])
}
