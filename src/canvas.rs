use crate::treemap::Rect;

/// Canvas size in pixels, owned by the host window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Truncating conversion from a host window size in (possibly fractional) points.
    pub fn from_size(width: f32, height: f32) -> Self {
        Self {
            width: width.max(0.0) as u32,
            height: height.max(0.0) as u32,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Scale a normalized rect to pixel space. No clamping is applied.
    pub fn to_pixels(&self, rect: &Rect) -> PixelRect {
        let width = self.width as f32;
        let height = self.height as f32;
        PixelRect::new(rect.x * width, rect.y * height, rect.w * width, rect.h * height)
    }

    /// Map a pixel position relative to the canvas origin to normalized coordinates.
    ///
    /// Positions outside the canvas map outside `[0, 1]`; an empty viewport has no
    /// meaningful mapping.
    pub fn normalize(&self, px: f32, py: f32) -> Option<(f32, f32)> {
        if self.is_empty() {
            return None;
        }
        Some((px / self.width as f32, py / self.height as f32))
    }
}

/// Rectangle in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PixelRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }
}
