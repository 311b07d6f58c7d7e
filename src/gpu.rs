//! Plain GPU-side handles and rectangles shared between the host renderer, the runtime and the
//! interop device. None of these own anything; ownership lives with whoever created them.
use std::convert::TryFrom;
use std::fmt;

/// Width and height in pixels
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Multiply both sides by `factor`, rounding to the nearest pixel and never below 1
    pub fn scaled(self, factor: f32) -> Self {
        let scale = |v: u32| ((v as f32 * factor).round() as u32).max(1);
        Self::new(scale(self.width), scale(self.height))
    }

    /// Component-wise minimum
    pub fn clamped_to(self, limit: Extent) -> Self {
        Self::new(self.width.min(limit.width), self.height.min(limit.height))
    }

    pub fn fits_within(self, limit: Extent) -> bool {
        self.width <= limit.width && self.height <= limit.height
    }

    /// Two buffers of the larger size placed next to each other. Saturates at `u32::MAX`.
    pub fn side_by_side(a: Extent, b: Extent) -> Self {
        Self::new(a.width.max(b.width).saturating_mul(2), a.height.max(b.height))
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// The 2D rectangle of a framebuffer an eye is drawn into. Measured in device pixels.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Viewport {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Viewport covering an entire surface
    pub fn full(extent: Extent) -> Self {
        Self::new(0, 0, pixels(extent.width), pixels(extent.height))
    }

    /// Left or right half of a surface shared by both eyes
    pub fn half(extent: Extent, index: usize) -> Self {
        let half = pixels(extent.width / 2);
        let x = if index == 0 { 0 } else { half };
        Self::new(x, 0, half, pixels(extent.height))
    }
}

/// Pixel count as a signed coordinate, saturating at `i32::MAX`
fn pixels(v: u32) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}

/// Host-side texture name (a GL texture, for instance)
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// Host-side framebuffer object name
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FramebufferId(pub u32);

/// Runtime-owned swapchain image. Opaque; interpreted by the runtime's graphics binding.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ImageHandle(pub u64);

/// Color formats the shim asks for
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ColorFormat {
    Rgba8,
    Srgb8,
    Srgb8Alpha8,
}

/// Engine-owned offscreen target with a color texture and a depth/stencil buffer
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RenderTarget {
    pub framebuffer: FramebufferId,
    pub color: TextureId,
    pub extent: Extent,
    pub format: ColorFormat,
}

/// A framebuffer handed in by the host for a present call
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Framebuffer {
    pub id: FramebufferId,
    pub extent: Extent,
}

/// How a texture is copied into the bound framebuffer
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BlitOptions {
    /// Mirror vertically while copying
    pub flip_y: bool,
    /// Gamma correction exponent; `None` copies values untouched
    pub gamma: Option<f32>,
    /// Blend weight towards greyscale in [0, 1]
    pub desaturate: f32,
}

impl Default for BlitOptions {
    fn default() -> Self {
        Self {
            flip_y: false,
            gamma: None,
            desaturate: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaling_rounds_and_never_collapses() {
        assert_eq!(Extent::new(1182, 1464).scaled(1.0), Extent::new(1182, 1464));
        assert_eq!(Extent::new(1000, 500).scaled(1.5), Extent::new(1500, 750));
        assert_eq!(Extent::new(3, 3).scaled(0.01), Extent::new(1, 1));
    }

    #[test]
    fn side_by_side_uses_larger_eye() {
        let tiled = Extent::side_by_side(Extent::new(1000, 1200), Extent::new(1010, 1190));
        assert_eq!(tiled, Extent::new(2020, 1200));
    }

    #[test]
    fn halves() {
        let extent = Extent::new(2000, 1000);
        assert_eq!(Viewport::half(extent, 0), Viewport::new(0, 0, 1000, 1000));
        assert_eq!(Viewport::half(extent, 1), Viewport::new(1000, 0, 1000, 1000));
    }

    #[test]
    fn oversized_extents_saturate() {
        let huge = Extent::new(1182, 1464).scaled(f32::INFINITY);
        assert_eq!(huge, Extent::new(u32::MAX, u32::MAX));
        assert_eq!(Extent::new(10, 10).scaled(f32::NAN), Extent::new(1, 1));
        assert_eq!(Extent::side_by_side(huge, huge).width, u32::MAX);

        let full = Viewport::full(huge);
        assert_eq!((full.width, full.height), (i32::MAX, i32::MAX));
        let right = Viewport::half(huge, 1);
        assert!(right.x > 0 && right.width > 0);
    }
}
