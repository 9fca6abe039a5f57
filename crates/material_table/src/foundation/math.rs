//! Math utilities and types
//!
//! Provides the small set of vector types the material records need.

pub use nalgebra::Vector4;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// Linear RGBA color with channels in `[0, 1]`
pub type Color = Vec4;

/// Opaque white
pub const WHITE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

/// Build a color from individual channels
pub fn rgba(r: f32, g: f32, b: f32, a: f32) -> Color {
    Color::new(r, g, b, a)
}

/// Clamp every channel into `[0, 1]`
///
/// Returns the clamped color and whether any channel changed.
pub fn saturate(color: Color) -> (Color, bool) {
    let clamped = color.map(|c| c.clamp(0.0, 1.0));
    let changed = clamped != color;
    (clamped, changed)
}

/// Check whether every channel lies in `[0, 1]`
pub fn is_normalized(color: &Color) -> bool {
    color.iter().all(|c| (0.0..=1.0).contains(c))
}
