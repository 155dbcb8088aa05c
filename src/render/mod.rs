//! Backend-agnostic rendering
//!
//! Builds a list of textured quads per frame. Vertices are `Pod` so a GPU
//! frontend can upload them directly.

pub mod scene;
pub mod vertex;

pub use scene::{Quad, Scene, SpriteRef, build_scene};
pub use vertex::{Vertex, parse_hex_color};
