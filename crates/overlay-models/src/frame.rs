//! Frame geometry: target canvas, safe zones and pixel rectangles.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Target canvas width for every output video.
pub const TARGET_WIDTH: u32 = 720;
/// Target canvas height for every output video.
pub const TARGET_HEIGHT: u32 = 1280;

/// Frame dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    /// The fixed 720×1280 portrait canvas.
    pub const PORTRAIT: FrameSize = FrameSize {
        width: TARGET_WIDTH,
        height: TARGET_HEIGHT,
    };

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for FrameSize {
    fn default() -> Self {
        Self::PORTRAIT
    }
}

/// Fractions of the frame kept clear of the platform UI.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SafeZones {
    /// Distance from the top edge to the TOP overlay (fraction of height)
    pub top: f32,
    /// Distance from the bottom edge to the BOTTOM overlay (fraction of height)
    pub bottom: f32,
    /// Horizontal margin on each side (fraction of width)
    pub side: f32,
}

impl Default for SafeZones {
    fn default() -> Self {
        Self {
            top: 0.12,
            bottom: 0.15,
            side: 0.10,
        }
    }
}

impl SafeZones {
    /// Widest content box that stays inside the side margins.
    pub fn content_width(&self, frame: FrameSize) -> u32 {
        let margin = (frame.width as f32 * self.side).round() as u32;
        frame.width.saturating_sub(2 * margin)
    }

    /// Row where the TOP overlay starts.
    pub fn top_edge(&self, frame: FrameSize) -> i32 {
        (frame.height as f32 * self.top).round() as i32
    }

    /// Exclusive row where the BOTTOM overlay ends.
    pub fn bottom_edge(&self, frame: FrameSize) -> i32 {
        (frame.height as f32 * (1.0 - self.bottom)).round() as i32
    }

    /// Rows available to all three overlays stacked.
    pub fn band_height(&self, frame: FrameSize) -> u32 {
        (self.bottom_edge(frame) - self.top_edge(frame)).max(0) as u32
    }
}

/// Axis-aligned pixel rectangle in frame coordinates.
///
/// `x`/`y` may be negative when content is wider than the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn top(&self) -> i32 {
        self.y
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// True when the vertical spans `[top, bottom)` share at least one row.
    pub fn intersects_vertically(&self, other: &PixelRect) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.top() < other.bottom() && other.top() < self.bottom()
    }
}
