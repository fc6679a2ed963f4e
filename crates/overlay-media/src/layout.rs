//! Greedy word-wrap against a pixel budget.

use overlay_models::{FrameSize, SafeZones, StyleDescriptor};

use crate::font::{FontHandle, FontResolver};

/// Wrapped text with its measured geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    /// Lines in visual order
    pub lines: Vec<String>,
    /// Measured width of each line
    pub line_widths: Vec<f32>,
    pub line_height_px: f32,
    /// Added between consecutive lines; may be negative
    pub line_spacing_offset_px: f32,
    pub block_width_px: u32,
    pub block_height_px: u32,
}

impl TextBlock {
    fn empty(style: &StyleDescriptor) -> Self {
        Self {
            lines: vec![String::new()],
            line_widths: vec![0.0],
            line_height_px: style.line_height_px(),
            line_spacing_offset_px: style.line_spacing_offset_px,
            block_width_px: 0,
            block_height_px: 0,
        }
    }

    /// True when nothing would be drawn.
    pub fn is_empty(&self) -> bool {
        self.block_width_px == 0 || self.block_height_px == 0
    }

    /// Top of line `index` relative to the block's top edge.
    pub fn line_top(&self, index: usize) -> f32 {
        index as f32 * (self.line_height_px + self.line_spacing_offset_px)
    }
}

/// Widest line a style may produce on `frame`: content box minus bubble padding.
pub fn max_text_width(frame: FrameSize, zones: &SafeZones, style: &StyleDescriptor) -> f32 {
    let content = zones.content_width(frame) as f32;
    (content - 2.0 * style.padding_horizontal_px as f32).max(1.0)
}

/// Split `text` into lines no wider than `max_width_px` at the style's size.
pub fn layout(text: &str, style: &StyleDescriptor, fonts: &FontResolver, max_width_px: f32) -> TextBlock {
    let font = fonts.resolve(style.font_size_px);

    let mut lines = Vec::new();
    for paragraph in split_paragraphs(text) {
        wrap_paragraph(&paragraph, &font, max_width_px, &mut lines);
    }

    if lines.is_empty() {
        return TextBlock::empty(style);
    }

    let line_widths: Vec<f32> = lines.iter().map(|l| font.measure(l)).collect();
    let n = lines.len() as f32;
    let line_height = style.line_height_px();
    let height = n * line_height + (n - 1.0) * style.line_spacing_offset_px;
    let width = line_widths.iter().copied().fold(0.0f32, f32::max);

    TextBlock {
        lines,
        line_widths,
        line_height_px: line_height,
        line_spacing_offset_px: style.line_spacing_offset_px,
        block_width_px: width.ceil().max(0.0) as u32,
        block_height_px: height.ceil().max(0.0) as u32,
    }
}

/// Explicit breaks: `\r\n`, `\n`, and the two-character literal `\n`.
/// Blank segments are dropped and inner whitespace runs collapse.
fn split_paragraphs(text: &str) -> Vec<String> {
    text.replace("\\n", "\n")
        .lines()
        .map(|segment| segment.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|segment| !segment.is_empty())
        .collect()
}

fn wrap_paragraph(paragraph: &str, font: &FontHandle, max_width_px: f32, lines: &mut Vec<String>) {
    let mut current = String::new();

    for word in paragraph.split(' ') {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }

        let candidate = format!("{} {}", current, word);
        if font.measure(&candidate) > max_width_px {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        } else {
            current = candidate;
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
}
