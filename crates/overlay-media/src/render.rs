//! Rasterise a laid-out [`TextBlock`] in one of the overlay styles.
//!
//! Output images are un-positioned and tight: bubbles are exactly the
//! padded bubble size, stroke and plain text are cropped to their painted
//! pixels.

use tiny_skia::{FillRule, IntRect, Mask, Paint, Path, PathBuilder, Pixmap, Rect, Transform};

use overlay_models::{RenderMode, Rgba, StyleDescriptor};

use crate::error::{MediaError, MediaResult};
use crate::font::{FontHandle, FontResolver};
use crate::layout::TextBlock;

/// Cubic Bézier handle length for a quarter circle.
const KAPPA: f32 = 0.552_284_8;

/// One rendered overlay. Empty when there was nothing to draw.
#[derive(Debug, Clone, Default)]
pub struct OverlayImage {
    pixmap: Option<Pixmap>,
}

impl OverlayImage {
    pub fn empty() -> Self {
        Self { pixmap: None }
    }

    pub fn width(&self) -> u32 {
        self.pixmap.as_ref().map_or(0, Pixmap::width)
    }

    pub fn height(&self) -> u32 {
        self.pixmap.as_ref().map_or(0, Pixmap::height)
    }

    pub fn is_empty(&self) -> bool {
        self.pixmap.is_none()
    }

    pub fn pixmap(&self) -> Option<&Pixmap> {
        self.pixmap.as_ref()
    }

    /// Straight-alpha color at `(x, y)`; transparent outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Rgba {
        self.pixmap
            .as_ref()
            .and_then(|p| p.pixel(x, y))
            .map(|c| {
                let c = c.demultiply();
                Rgba::new(c.red(), c.green(), c.blue(), c.alpha())
            })
            .unwrap_or(Rgba::TRANSPARENT)
    }
}

/// Render `block` with `style`.
pub fn render(block: &TextBlock, style: &StyleDescriptor, fonts: &FontResolver) -> MediaResult<OverlayImage> {
    if block.is_empty() {
        return Ok(OverlayImage::empty());
    }

    let font = fonts.resolve(style.font_size_px);

    match style.render_mode() {
        RenderMode::Bubble { background } => render_bubble(block, style, &font, background),
        RenderMode::Stroke { color, width_px } => render_outlined(block, style, &font, Some((color, width_px))),
        RenderMode::Plain => render_outlined(block, style, &font, None),
    }
}

fn render_bubble(
    block: &TextBlock,
    style: &StyleDescriptor,
    font: &FontHandle,
    background: Rgba,
) -> MediaResult<OverlayImage> {
    let width = block.block_width_px + 2 * style.padding_horizontal_px;
    let height = block.block_height_px + 2 * style.padding_vertical_px;
    let mut pixmap = new_pixmap(width, height)?;

    let path = rounded_rect(width as f32, height as f32, style.corner_radius_px)
        .ok_or_else(|| MediaError::render("degenerate bubble shape"))?;
    pixmap.fill_path(&path, &solid(background), FillRule::Winding, Transform::identity(), None);

    let mut coverage = vec![0u8; (width * height) as usize];
    draw_text(
        &mut coverage,
        width,
        height,
        block,
        font,
        style.padding_horizontal_px as i32,
        style.padding_vertical_px as i32,
    );
    fill_coverage(&mut pixmap, coverage, style.text_color)?;

    Ok(OverlayImage { pixmap: Some(pixmap) })
}

/// Stroke mode when `stroke` is set, plain text otherwise.
fn render_outlined(
    block: &TextBlock,
    style: &StyleDescriptor,
    font: &FontHandle,
    stroke: Option<(Rgba, u32)>,
) -> MediaResult<OverlayImage> {
    let stroke_px = stroke.map_or(0, |(_, w)| w);
    // Room for the stroke plus glyphs that overhang the line box.
    let margin = stroke_px + (style.font_size_px / 2.0).ceil() as u32;
    let width = block.block_width_px + 2 * margin;
    let height = block.block_height_px + 2 * margin;
    let mut pixmap = new_pixmap(width, height)?;

    let mut text = vec![0u8; (width * height) as usize];
    draw_text(&mut text, width, height, block, font, margin as i32, margin as i32);

    if let Some((color, radius)) = stroke {
        let outline = dilate(&text, width, height, radius);
        fill_coverage(&mut pixmap, outline, color)?;
    }
    fill_coverage(&mut pixmap, text, style.text_color)?;

    Ok(OverlayImage {
        pixmap: crop_to_content(&pixmap),
    })
}

/// Blit every line's coverage into `dst`, each line centered in the block.
fn draw_text(
    dst: &mut [u8],
    width: u32,
    height: u32,
    block: &TextBlock,
    font: &FontHandle,
    origin_x: i32,
    origin_y: i32,
) {
    let metrics = font.line_metrics();

    for (i, (line, line_width)) in block.lines.iter().zip(&block.line_widths).enumerate() {
        let mask = font.rasterize_line(line);
        if mask.is_empty() {
            continue;
        }

        let pen_x = origin_x as f32 + (block.block_width_px as f32 - line_width) / 2.0;
        let baseline = origin_y as f32
            + block.line_top(i)
            + block.line_height_px / 2.0
            + (metrics.ascent + metrics.descent) / 2.0;

        let left = pen_x.round() as i32 + mask.origin_x;
        let top = baseline.round() as i32 - mask.baseline;

        for my in 0..mask.height {
            let y = top + my as i32;
            if y < 0 || y >= height as i32 {
                continue;
            }
            for mx in 0..mask.width {
                let x = left + mx as i32;
                if x < 0 || x >= width as i32 {
                    continue;
                }
                let idx = (y as u32 * width + x as u32) as usize;
                dst[idx] = dst[idx].max(mask.at(mx, my));
            }
        }
    }
}

/// Grey-scale dilation by a disk of `radius` pixels.
fn dilate(src: &[u8], width: u32, height: u32, radius: u32) -> Vec<u8> {
    let r = radius as i32;
    let offsets: Vec<(i32, i32)> = (-r..=r)
        .flat_map(|dy| (-r..=r).map(move |dx| (dx, dy)))
        .filter(|(dx, dy)| dx * dx + dy * dy <= r * r)
        .collect();

    let (w, h) = (width as i32, height as i32);
    let mut dst = vec![0u8; src.len()];

    for y in 0..h {
        for x in 0..w {
            let c = src[(y * w + x) as usize];
            if c == 0 {
                continue;
            }
            for (dx, dy) in &offsets {
                let (nx, ny) = (x + dx, y + dy);
                if nx < 0 || ny < 0 || nx >= w || ny >= h {
                    continue;
                }
                let idx = (ny * w + nx) as usize;
                dst[idx] = dst[idx].max(c);
            }
        }
    }

    dst
}

/// Paint `color` through a coverage buffer the size of `pixmap`.
fn fill_coverage(pixmap: &mut Pixmap, coverage: Vec<u8>, color: Rgba) -> MediaResult<()> {
    let (width, height) = (pixmap.width(), pixmap.height());
    let mut mask = Mask::new(width, height).ok_or_else(|| MediaError::render("failed to allocate text mask"))?;
    mask.data_mut().copy_from_slice(&coverage);

    let rect = Rect::from_xywh(0.0, 0.0, width as f32, height as f32)
        .ok_or_else(|| MediaError::render("invalid text rect"))?;
    pixmap.fill_rect(rect, &solid(color), Transform::identity(), Some(&mask));
    Ok(())
}

/// Smallest sub-image holding every non-transparent pixel; `None` when blank.
fn crop_to_content(pixmap: &Pixmap) -> Option<Pixmap> {
    let width = pixmap.width();
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (u32::MAX, u32::MAX, 0u32, 0u32);

    for (i, px) in pixmap.pixels().iter().enumerate() {
        if px.alpha() == 0 {
            continue;
        }
        let (x, y) = (i as u32 % width, i as u32 / width);
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }

    if min_x == u32::MAX {
        return None;
    }

    let rect = IntRect::from_xywh(min_x as i32, min_y as i32, max_x - min_x + 1, max_y - min_y + 1)?;
    pixmap.clone_rect(rect)
}

fn rounded_rect(width: f32, height: f32, radius: f32) -> Option<Path> {
    let r = radius.max(0.0).min(width.min(height) / 2.0);
    let k = r * KAPPA;

    let mut pb = PathBuilder::new();
    if r <= 0.0 {
        pb.push_rect(Rect::from_xywh(0.0, 0.0, width, height)?);
        return pb.finish();
    }

    pb.move_to(r, 0.0);
    pb.line_to(width - r, 0.0);
    pb.cubic_to(width - r + k, 0.0, width, r - k, width, r);
    pb.line_to(width, height - r);
    pb.cubic_to(width, height - r + k, width - r + k, height, width - r, height);
    pb.line_to(r, height);
    pb.cubic_to(r - k, height, 0.0, height - r + k, 0.0, height - r);
    pb.line_to(0.0, r);
    pb.cubic_to(0.0, r - k, r - k, 0.0, r, 0.0);
    pb.close();
    pb.finish()
}

fn new_pixmap(width: u32, height: u32) -> MediaResult<Pixmap> {
    Pixmap::new(width, height)
        .ok_or_else(|| MediaError::render(format!("cannot allocate {}x{} overlay", width, height)))
}

fn solid(color: Rgba) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, color.a);
    paint.anti_alias = true;
    paint
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::layout;

    fn fonts() -> FontResolver {
        FontResolver::placeholder()
    }

    #[test]
    fn test_empty_block_renders_nothing() {
        let style = StyleDescriptor::top_bubble();
        let block = layout("   ", &style, &fonts(), 500.0);
        let image = render(&block, &style, &fonts()).unwrap();
        assert!(image.is_empty());
        assert_eq!(image.width(), 0);
    }

    #[test]
    fn test_bubble_is_padded_block_size() {
        let style = StyleDescriptor::top_bubble();
        let block = layout("Hello overlay", &style, &fonts(), 500.0);
        let image = render(&block, &style, &fonts()).unwrap();

        assert_eq!(image.width(), block.block_width_px + 2 * style.padding_horizontal_px);
        assert_eq!(image.height(), block.block_height_px + 2 * style.padding_vertical_px);

        // Rounded corner is cut away, the edge midpoint is solid background.
        assert_eq!(image.pixel(0, 0).a, 0);
        assert_eq!(image.pixel(image.width() / 2, 1), Rgba::WHITE);
        // Some glyph pixel is dark text on the white bubble.
        let found = (0..image.height()).any(|y| (0..image.width()).any(|x| image.pixel(x, y).r < 0x40));
        assert!(found);
    }

    #[test]
    fn test_stroke_surrounds_text() {
        let style = StyleDescriptor::center_stroke();
        let block = layout("Stroke", &style, &fonts(), 500.0);
        let image = render(&block, &style, &fonts()).unwrap();
        let stroke = style.stroke_color.unwrap();

        // Cropped: first column holds painted pixels, and it is stroke, not fill.
        let left_column: Vec<Rgba> = (0..image.height()).map(|y| image.pixel(0, y)).collect();
        assert!(left_column.iter().any(|p| p.a > 0));
        assert!(left_column.iter().filter(|p| p.a == 255).all(|p| *p == stroke));

        assert!(image.width() >= block.block_width_px);
    }

    #[test]
    fn test_plain_mode_crops_tightly() {
        let mut style = StyleDescriptor::center_stroke();
        style.stroke_color = None;
        style.stroke_width_px = 0;
        let block = layout("Plain", &style, &fonts(), 500.0);
        let image = render(&block, &style, &fonts()).unwrap();
        assert!(!image.is_empty());
        assert!(image.width() <= block.block_width_px);
    }

    #[test]
    fn test_dilate_disk() {
        let mut src = vec![0u8; 9 * 9];
        src[4 * 9 + 4] = 200;
        let out = dilate(&src, 9, 9, 2);
        assert_eq!(out[4 * 9 + 6], 200);
        assert_eq!(out[2 * 9 + 4], 200);
        assert_eq!(out[2 * 9 + 2], 0);
    }

    #[test]
    fn test_rounded_rect_radius_clamped() {
        assert!(rounded_rect(10.0, 4.0, 50.0).is_some());
        assert!(rounded_rect(10.0, 4.0, 0.0).is_some());
    }
}
