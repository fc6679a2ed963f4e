//! Overlay slots and style descriptors.
//!
//! The visual language is fixed configuration: three immutable
//! [`StyleDescriptor`] values, one per [`Slot`]. The renderer never branches
//! on the slot itself, only on the [`RenderMode`] a descriptor implies, so a
//! fourth style is a new value rather than a new code path.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::color::Rgba;
use crate::error::{ModelError, ModelResult};

/// One of the three overlay positions, in paint order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    Top,
    Center,
    Bottom,
}

impl Slot {
    /// All slots in paint order. Later entries win on pixel overlap.
    pub const ALL: [Slot; 3] = [Slot::Top, Slot::Center, Slot::Bottom];

    pub fn index(&self) -> usize {
        match self {
            Slot::Top => 0,
            Slot::Center => 1,
            Slot::Bottom => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::Top => "top",
            Slot::Center => "center",
            Slot::Bottom => "bottom",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Slot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "top" => Ok(Slot::Top),
            "center" | "centre" => Ok(Slot::Center),
            "bottom" => Ok(Slot::Bottom),
            other => Err(format!("unknown slot: {}", other)),
        }
    }
}

/// Where a style's block is anchored vertically within the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VerticalAnchor {
    Top,
    Center,
    Bottom,
}

/// How a descriptor is rasterised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Rounded-rectangle background behind plain glyphs
    Bubble { background: Rgba },
    /// Glyphs outlined by a dilated copy in the stroke color
    Stroke { color: Rgba, width_px: u32 },
    /// Glyphs only
    Plain,
}

/// Immutable styling for one overlay slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StyleDescriptor {
    /// Font size in pixels
    pub font_size_px: f32,
    /// Glyph fill color
    pub text_color: Rgba,
    /// Bubble fill; mutually exclusive with `stroke_color`
    #[serde(default)]
    pub background_color: Option<Rgba>,
    /// Outline color; mutually exclusive with `background_color`
    #[serde(default)]
    pub stroke_color: Option<Rgba>,
    #[serde(default)]
    pub stroke_width_px: u32,
    #[serde(default)]
    pub padding_vertical_px: u32,
    #[serde(default)]
    pub padding_horizontal_px: u32,
    #[serde(default)]
    pub corner_radius_px: f32,
    /// Line pitch as a multiple of the font size
    pub line_height_multiplier: f32,
    /// Extra pixels added between consecutive lines (may be negative)
    #[serde(default)]
    pub line_spacing_offset_px: f32,
    /// Frame edge the block hangs from; edge distances come from [`SafeZones`](crate::SafeZones)
    pub vertical_anchor: VerticalAnchor,
}

impl StyleDescriptor {
    /// White bubble, near-black text, hung from the top safe zone.
    pub fn top_bubble() -> Self {
        Self {
            font_size_px: 42.0,
            text_color: Rgba::opaque(0x13, 0x13, 0x13),
            background_color: Some(Rgba::WHITE),
            stroke_color: None,
            stroke_width_px: 0,
            padding_vertical_px: 20,
            padding_horizontal_px: 26,
            corner_radius_px: 13.0,
            line_height_multiplier: 1.15,
            line_spacing_offset_px: 0.0,
            vertical_anchor: VerticalAnchor::Top,
        }
    }

    /// White text with a 9px black outline, vertically centered.
    pub fn center_stroke() -> Self {
        Self {
            font_size_px: 42.0,
            text_color: Rgba::WHITE,
            background_color: None,
            stroke_color: Some(Rgba::BLACK),
            stroke_width_px: 9,
            padding_vertical_px: 0,
            padding_horizontal_px: 22,
            corner_radius_px: 0.0,
            line_height_multiplier: 1.2,
            line_spacing_offset_px: 0.0,
            vertical_anchor: VerticalAnchor::Center,
        }
    }

    /// Red bubble, white text, resting on the bottom safe zone, tight line pitch.
    pub fn bottom_bubble() -> Self {
        Self {
            font_size_px: 46.0,
            text_color: Rgba::WHITE,
            background_color: Some(Rgba::opaque(0xDB, 0x36, 0x43)),
            stroke_color: None,
            stroke_width_px: 0,
            padding_vertical_px: 33,
            padding_horizontal_px: 26,
            corner_radius_px: 7.0,
            line_height_multiplier: 1.0,
            line_spacing_offset_px: -4.0,
            vertical_anchor: VerticalAnchor::Bottom,
        }
    }

    /// Default descriptor for a slot.
    pub fn for_slot(slot: Slot) -> Self {
        match slot {
            Slot::Top => Self::top_bubble(),
            Slot::Center => Self::center_stroke(),
            Slot::Bottom => Self::bottom_bubble(),
        }
    }

    pub fn render_mode(&self) -> RenderMode {
        match (self.background_color, self.stroke_color) {
            (Some(background), _) => RenderMode::Bubble { background },
            (None, Some(color)) if self.stroke_width_px > 0 => RenderMode::Stroke {
                color,
                width_px: self.stroke_width_px,
            },
            _ => RenderMode::Plain,
        }
    }

    /// Line pitch in pixels.
    pub fn line_height_px(&self) -> f32 {
        self.font_size_px * self.line_height_multiplier
    }

    /// Check internal consistency; `slot` is only used in error messages.
    pub fn validate(&self, slot: Slot) -> ModelResult<()> {
        let invalid = |reason: &str| ModelError::InvalidStyle {
            slot: slot.to_string(),
            reason: reason.to_string(),
        };

        if self.background_color.is_some() && self.stroke_color.is_some() {
            return Err(ModelError::ConflictingStyle {
                slot: slot.to_string(),
            });
        }
        if !(self.font_size_px.is_finite() && self.font_size_px > 0.0) {
            return Err(invalid("font size must be positive"));
        }
        if !(self.line_height_multiplier.is_finite() && self.line_height_multiplier > 0.0) {
            return Err(invalid("line height multiplier must be positive"));
        }
        if self.line_height_px() + self.line_spacing_offset_px <= 0.0 {
            return Err(invalid("line spacing offset collapses the line pitch"));
        }
        if self.stroke_color.is_some() && self.stroke_width_px == 0 {
            return Err(invalid("stroke color requires a stroke width"));
        }
        if self.corner_radius_px < 0.0 {
            return Err(invalid("corner radius must not be negative"));
        }
        Ok(())
    }
}

/// The three descriptors used for every request, plus a version tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StyleSet {
    pub version: String,
    pub top: StyleDescriptor,
    pub center: StyleDescriptor,
    pub bottom: StyleDescriptor,
}

impl Default for StyleSet {
    fn default() -> Self {
        Self {
            version: "v1".to_string(),
            top: StyleDescriptor::top_bubble(),
            center: StyleDescriptor::center_stroke(),
            bottom: StyleDescriptor::bottom_bubble(),
        }
    }
}

impl StyleSet {
    pub fn get(&self, slot: Slot) -> &StyleDescriptor {
        match slot {
            Slot::Top => &self.top,
            Slot::Center => &self.center,
            Slot::Bottom => &self.bottom,
        }
    }

    /// Descriptors in paint order.
    pub fn iter(&self) -> impl Iterator<Item = (Slot, &StyleDescriptor)> {
        Slot::ALL.into_iter().map(move |slot| (slot, self.get(slot)))
    }

    pub fn validate(&self) -> ModelResult<()> {
        self.iter().try_for_each(|(slot, style)| style.validate(slot))
    }
}
