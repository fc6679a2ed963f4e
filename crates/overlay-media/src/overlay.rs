//! Text-to-composite pipeline: layout, render and compose the three slots.

use tracing::debug;

use overlay_models::{FrameSize, OverlayTexts, SafeZones, Slot, StyleSet};

use crate::compose::{compose, CompositeOverlay};
use crate::error::MediaResult;
use crate::font::FontResolver;
use crate::layout::{layout, max_text_width};
use crate::render::{render, OverlayImage};

/// Builds the full-frame overlay for a set of texts.
///
/// CPU bound; run it on a blocking thread from async code.
#[derive(Debug, Clone)]
pub struct OverlayBuilder {
    styles: StyleSet,
    fonts: FontResolver,
    frame: FrameSize,
    zones: SafeZones,
}

impl OverlayBuilder {
    pub fn new(styles: StyleSet, fonts: FontResolver) -> Self {
        Self {
            styles,
            fonts,
            frame: FrameSize::PORTRAIT,
            zones: SafeZones::default(),
        }
    }

    pub fn frame(&self) -> FrameSize {
        self.frame
    }

    /// Lay out and rasterise one slot.
    pub fn render_slot(&self, slot: Slot, text: &str) -> MediaResult<OverlayImage> {
        let style = self.styles.get(slot);
        let max_width = max_text_width(self.frame, &self.zones, style);
        let block = layout(text, style, &self.fonts, max_width);

        debug!(
            slot = %slot,
            lines = block.lines.len(),
            width = block.block_width_px,
            height = block.block_height_px,
            "Laid out overlay text"
        );

        render(&block, style, &self.fonts)
    }

    pub fn build(&self, texts: &OverlayTexts) -> MediaResult<CompositeOverlay> {
        let [top, center, bottom] = Slot::ALL;
        let overlays = [
            self.render_slot(top, texts.get(top))?,
            self.render_slot(center, texts.get(center))?,
            self.render_slot(bottom, texts.get(bottom))?,
        ];
        compose(self.frame, &self.zones, &self.styles, &overlays)
    }
}
