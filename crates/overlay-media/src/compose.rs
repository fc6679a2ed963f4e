//! Position the three overlays on the frame and flatten them into one image.

use std::io::Cursor;
use std::path::Path;

use image::{ImageOutputFormat, RgbaImage};
use tiny_skia::{Pixmap, PixmapPaint, Transform};

use overlay_models::{FrameSize, PixelRect, SafeZones, Slot, StyleSet, VerticalAnchor};

use crate::error::{MediaError, MediaResult};
use crate::render::OverlayImage;

/// Final frame rectangle of one slot. Empty overlays get an empty rect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub slot: Slot,
    pub rect: PixelRect,
}

/// Full-frame transparent canvas with the three overlays painted in.
#[derive(Debug, Clone)]
pub struct CompositeOverlay {
    pub frame: FrameSize,
    pixmap: Pixmap,
    placements: [Placement; 3],
}

impl CompositeOverlay {
    pub fn placement(&self, slot: Slot) -> &Placement {
        &self.placements[slot.index()]
    }

    pub fn placements(&self) -> &[Placement; 3] {
        &self.placements
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    /// Straight-alpha copy for PNG encoding.
    pub fn to_rgba_image(&self) -> MediaResult<RgbaImage> {
        let mut data = Vec::with_capacity(self.pixmap.pixels().len() * 4);
        for px in self.pixmap.pixels() {
            let c = px.demultiply();
            data.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
        RgbaImage::from_raw(self.frame.width, self.frame.height, data)
            .ok_or_else(|| MediaError::compose("composite buffer does not match frame size"))
    }

    pub fn encode_png(&self) -> MediaResult<Vec<u8>> {
        let mut buf = Cursor::new(Vec::new());
        self.to_rgba_image()?.write_to(&mut buf, ImageOutputFormat::Png)?;
        Ok(buf.into_inner())
    }

    pub fn write_png(&self, path: impl AsRef<Path>) -> MediaResult<()> {
        std::fs::write(path, self.encode_png()?)?;
        Ok(())
    }
}

/// Place `overlays` (indexed by [`Slot::index`]) and composite them in paint order.
///
/// Fails with [`MediaError::TextOverflow`] when the overlays are taller
/// together than the band between the top and bottom safe zones; below that
/// the placements never overlap.
pub fn compose(
    frame: FrameSize,
    zones: &SafeZones,
    styles: &StyleSet,
    overlays: &[OverlayImage; 3],
) -> MediaResult<CompositeOverlay> {
    let band = zones.band_height(frame);
    let stacked: u32 = overlays.iter().map(OverlayImage::height).sum();
    if stacked > band {
        return Err(MediaError::TextOverflow(format!(
            "overlays need {}px but only {}px fit between the safe zones",
            stacked, band
        )));
    }

    let mut pixmap = Pixmap::new(frame.width, frame.height)
        .ok_or_else(|| MediaError::compose(format!("cannot allocate {}x{} canvas", frame.width, frame.height)))?;

    let mut rects = [PixelRect::default(); 3];
    for slot in Slot::ALL {
        let overlay = &overlays[slot.index()];
        if overlay.is_empty() {
            continue;
        }
        rects[slot.index()] = anchored_rect(frame, zones, overlay, styles.get(slot).vertical_anchor);
    }

    rects[Slot::Center.index()] = resolve_center(
        rects[Slot::Top.index()],
        rects[Slot::Center.index()],
        rects[Slot::Bottom.index()],
    );

    for slot in Slot::ALL {
        if let Some(image) = overlays[slot.index()].pixmap() {
            let rect = rects[slot.index()];
            pixmap.draw_pixmap(
                rect.x,
                rect.y,
                image.as_ref(),
                &PixmapPaint::default(),
                Transform::identity(),
                None,
            );
        }
    }

    let placements = Slot::ALL.map(|slot| Placement {
        slot,
        rect: rects[slot.index()],
    });

    Ok(CompositeOverlay {
        frame,
        pixmap,
        placements,
    })
}

fn anchored_rect(frame: FrameSize, zones: &SafeZones, overlay: &OverlayImage, anchor: VerticalAnchor) -> PixelRect {
    let (w, h) = (overlay.width(), overlay.height());
    let x = (frame.width as i32 - w as i32) / 2;
    let y = match anchor {
        VerticalAnchor::Top => zones.top_edge(frame),
        VerticalAnchor::Bottom => zones.bottom_edge(frame) - h as i32,
        VerticalAnchor::Center => (frame.height as i32 - h as i32) / 2,
    };
    PixelRect::new(x, y, w, h)
}

/// Move CENTER off TOP or BOTTOM; reposition only, never resize.
fn resolve_center(top: PixelRect, center: PixelRect, bottom: PixelRect) -> PixelRect {
    if center.is_empty() {
        return center;
    }

    let mut moved = center;
    if moved.intersects_vertically(&top) {
        moved.y = top.bottom();
    } else if moved.intersects_vertically(&bottom) {
        moved.y = bottom.top() - moved.height as i32;
    }

    if moved.intersects_vertically(&top) || moved.intersects_vertically(&bottom) {
        let upper = if top.is_empty() { 0 } else { top.bottom() };
        let lower = if bottom.is_empty() { i32::MAX } else { bottom.top() };
        let midpoint = if lower == i32::MAX { upper } else { (upper + lower) / 2 };
        moved.y = midpoint - moved.height as i32 / 2;
    }

    moved
}
