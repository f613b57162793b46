//! Core domain types and operations
//!
//! Pure geometry types shared by the scene and the platform layer.
//! They carry real pixels only and know nothing about windows or pages.

/// Largest surface edge accepted anywhere in the crate
pub const MAX_SURFACE_EDGE: u32 = 8192;

/// Size of the visible page area the background is stretched over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Creates a viewport, clamping both edges to `1..=MAX_SURFACE_EDGE`
    ///
    /// A zero-sized surface cannot be rendered into, so degenerate sizes
    /// (a minimized window, a collapsed region) collapse to one pixel.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.clamp(1, MAX_SURFACE_EDGE),
            height: height.clamp(1, MAX_SURFACE_EDGE),
        }
    }

    /// Width divided by height, used as the camera aspect ratio
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

/// Rectangle in real pixel coordinates
#[cfg(windows)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

#[cfg(windows)]
impl Rect {
    /// Creates a new rectangle
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Rectangle at `(x, y)` covering the given viewport
    pub fn at(x: i32, y: i32, viewport: Viewport) -> Self {
        Self::new(x, y, viewport.width as i32, viewport.height as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_clamps_degenerate_sizes() {
        let viewport = Viewport::new(0, 0);
        assert_eq!(viewport, Viewport { width: 1, height: 1 });

        let huge = Viewport::new(100_000, 20);
        assert_eq!(huge.width, MAX_SURFACE_EDGE);
        assert_eq!(huge.height, 20);
    }

    #[test]
    fn viewport_aspect_ratio() {
        let viewport = Viewport::new(1920, 1080);
        assert!((viewport.aspect() - 16.0 / 9.0).abs() < 1e-6);
    }

    #[cfg(windows)]
    #[test]
    fn rect_covers_viewport() {
        let rect = Rect::at(10, 20, Viewport::new(100, 50));
        assert_eq!(rect, Rect::new(10, 20, 100, 50));
    }
}
