//! Font loading and glyph rasterisation.
//!
//! A [`FontResolver`] is built once at startup. It tries the configured
//! font, then development paths, then common system fonts, and finally the
//! DejaVu Sans Bold face compiled into the binary. Rendering therefore never
//! fails for lack of a font; it only degrades.
//!
//! The placeholder face (hollow boxes, fixed advances) gives unit tests
//! metrics that do not depend on any font file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use fontdue::{Font, FontSettings};
use tracing::{debug, error, info, warn};

use crate::error::{MediaError, MediaResult};

// =============================================================================
// Constants
// =============================================================================

/// Default font path in the production container.
pub const DEFAULT_FONT_PATH: &str = "/app/assets/fonts/ProximaNova-Semibold.ttf";

/// Development fallback paths to check.
const DEV_FONT_PATHS: &[&str] = &[
    "./assets/fonts/ProximaNova-Semibold.ttf",
    "../assets/fonts/ProximaNova-Semibold.ttf",
    "../../assets/fonts/ProximaNova-Semibold.ttf",
];

/// System fonts tried when no bundled font is present.
const SYSTEM_FALLBACK_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/truetype/noto/NotoSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/System/Library/Fonts/Helvetica.ttc",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
];

/// Last-resort face, bundled so a bare container still draws real glyphs.
const EMBEDDED_FONT: &[u8] = include_bytes!("../assets/fonts/DejaVuSans-Bold.ttf");

/// Placeholder advance as a fraction of the font size.
const PLACEHOLDER_ADVANCE: f32 = 0.55;
/// Placeholder space advance as a fraction of the font size.
const PLACEHOLDER_SPACE_ADVANCE: f32 = 0.3;
const PLACEHOLDER_ASCENT: f32 = 0.8;
const PLACEHOLDER_DESCENT: f32 = -0.2;

// =============================================================================
// Types
// =============================================================================

/// Where the active face came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontSource {
    /// The configured (or default) bundled font
    Primary(PathBuf),
    /// A development or system font found on disk
    Fallback(PathBuf),
    /// The face compiled into the binary
    Embedded,
    /// Box glyphs with fixed metrics
    Placeholder,
}

impl FontSource {
    pub fn is_degraded(&self) -> bool {
        !matches!(self, FontSource::Primary(_))
    }
}

enum Face {
    Outline(Font),
    Placeholder,
}

impl std::fmt::Debug for Face {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Face::Outline(_) => f.write_str("Face::Outline"),
            Face::Placeholder => f.write_str("Face::Placeholder"),
        }
    }
}

/// Loaded font, shared across requests.
#[derive(Debug, Clone)]
pub struct FontResolver {
    face: Arc<Face>,
    source: FontSource,
}

/// A face at a fixed pixel size.
#[derive(Debug, Clone)]
pub struct FontHandle {
    face: Arc<Face>,
    size_px: f32,
}

/// Vertical metrics of a face at a given size. `descent` is negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineMetrics {
    pub ascent: f32,
    pub descent: f32,
}

/// Anti-aliased coverage of one rasterised line.
///
/// Mask coordinates are relative to the pen: the pen origin sits at
/// column `-origin_x` and the baseline at row `baseline`.
#[derive(Debug, Clone, Default)]
pub struct LineMask {
    pub width: u32,
    pub height: u32,
    /// Horizontal offset of column 0 from the pen origin
    pub origin_x: i32,
    /// Row of the baseline within the mask
    pub baseline: i32,
    pub coverage: Vec<u8>,
}

impl LineMask {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn at(&self, x: u32, y: u32) -> u8 {
        self.coverage[(y * self.width + x) as usize]
    }
}

// =============================================================================
// Resolver
// =============================================================================

impl FontResolver {
    /// Load the font at `primary` (or [`DEFAULT_FONT_PATH`]), degrading to
    /// fallbacks with a warning.
    pub fn load(primary: Option<&Path>) -> Self {
        let system: Vec<PathBuf> = SYSTEM_FALLBACK_FONTS.iter().map(PathBuf::from).collect();
        Self::load_with_fallbacks(primary, &system)
    }

    /// Like [`FontResolver::load`] with an explicit list of system fallbacks.
    pub fn load_with_fallbacks(primary: Option<&Path>, fallbacks: &[PathBuf]) -> Self {
        let primary = primary
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FONT_PATH));

        match load_font_file(&primary) {
            Ok(font) => {
                info!(path = %primary.display(), "Loaded overlay font");
                return Self::outline(font, FontSource::Primary(primary));
            }
            Err(e) => warn!(path = %primary.display(), "Primary font unavailable: {}", e),
        }

        let candidates = DEV_FONT_PATHS
            .iter()
            .map(PathBuf::from)
            .chain(fallbacks.iter().cloned());

        for candidate in candidates {
            if !candidate.exists() {
                continue;
            }
            match load_font_file(&candidate) {
                Ok(font) => {
                    warn!(path = %candidate.display(), "Rendering overlays with fallback font");
                    return Self::outline(font, FontSource::Fallback(candidate));
                }
                Err(e) => debug!(path = %candidate.display(), "Skipping fallback font: {}", e),
            }
        }

        match Self::embedded() {
            Ok(resolver) => {
                warn!("No font found on disk, rendering overlays with the embedded face");
                resolver
            }
            Err(e) => {
                error!("{}; overlays will use placeholder glyphs", e);
                Self::placeholder()
            }
        }
    }

    /// Resolver over the face compiled into the binary.
    pub fn embedded() -> MediaResult<Self> {
        let font = Font::from_bytes(EMBEDDED_FONT, FontSettings::default())
            .map_err(|e| MediaError::render(format!("embedded font is unreadable: {}", e)))?;
        Ok(Self::outline(font, FontSource::Embedded))
    }

    /// Resolver that always draws placeholder glyphs. Metrics are exact
    /// multiples of the size, which keeps layout tests font-independent.
    pub fn placeholder() -> Self {
        Self {
            face: Arc::new(Face::Placeholder),
            source: FontSource::Placeholder,
        }
    }

    fn outline(font: Font, source: FontSource) -> Self {
        Self {
            face: Arc::new(Face::Outline(font)),
            source,
        }
    }

    pub fn source(&self) -> &FontSource {
        &self.source
    }

    pub fn is_degraded(&self) -> bool {
        self.source.is_degraded()
    }

    /// Face at `size_px`. Non-positive sizes are clamped to one pixel.
    pub fn resolve(&self, size_px: f32) -> FontHandle {
        FontHandle {
            face: Arc::clone(&self.face),
            size_px: if size_px.is_finite() { size_px.max(1.0) } else { 1.0 },
        }
    }
}

fn load_font_file(path: &Path) -> MediaResult<Font> {
    let data = std::fs::read(path)?;
    Font::from_bytes(data, FontSettings::default())
        .map_err(|e| MediaError::render(format!("failed to parse font {}: {}", path.display(), e)))
}

// =============================================================================
// Handle
// =============================================================================

impl FontHandle {
    pub fn size_px(&self) -> f32 {
        self.size_px
    }

    /// Horizontal advance of `text` in pixels, kerning included.
    pub fn measure(&self, text: &str) -> f32 {
        let mut width = 0.0;
        let mut prev: Option<char> = None;
        for ch in text.chars() {
            width += self.advance(ch) + self.kern(prev, ch);
            prev = Some(ch);
        }
        width
    }

    pub fn line_metrics(&self) -> LineMetrics {
        match self.face.as_ref() {
            Face::Outline(font) => font
                .horizontal_line_metrics(self.size_px)
                .map(|m| LineMetrics {
                    ascent: m.ascent,
                    descent: m.descent,
                })
                .unwrap_or(LineMetrics {
                    ascent: self.size_px * PLACEHOLDER_ASCENT,
                    descent: self.size_px * PLACEHOLDER_DESCENT,
                }),
            Face::Placeholder => LineMetrics {
                ascent: self.size_px * PLACEHOLDER_ASCENT,
                descent: self.size_px * PLACEHOLDER_DESCENT,
            },
        }
    }

    fn advance(&self, ch: char) -> f32 {
        match self.face.as_ref() {
            Face::Outline(font) => font.metrics(ch, self.size_px).advance_width,
            Face::Placeholder => placeholder_advance(ch, self.size_px),
        }
    }

    fn kern(&self, prev: Option<char>, ch: char) -> f32 {
        match (self.face.as_ref(), prev) {
            (Face::Outline(font), Some(left)) => {
                font.horizontal_kern(left, ch, self.size_px).unwrap_or(0.0)
            }
            _ => 0.0,
        }
    }

    /// Rasterise a single line of text into a coverage mask.
    pub fn rasterize_line(&self, text: &str) -> LineMask {
        let mut glyphs: Vec<PlacedGlyph> = Vec::new();
        let mut cursor = 0.0f32;
        let mut prev: Option<char> = None;

        for ch in text.chars() {
            cursor += self.kern(prev, ch);
            if let Some(glyph) = self.rasterize_glyph(ch, cursor) {
                glyphs.push(glyph);
            }
            cursor += self.advance(ch);
            prev = Some(ch);
        }

        let Some(first) = glyphs.first() else {
            return LineMask::default();
        };

        let (mut min_x, mut min_y) = (first.x, first.y);
        let (mut max_x, mut max_y) = (first.x + first.width as i32, first.y + first.height as i32);
        for g in &glyphs[1..] {
            min_x = min_x.min(g.x);
            min_y = min_y.min(g.y);
            max_x = max_x.max(g.x + g.width as i32);
            max_y = max_y.max(g.y + g.height as i32);
        }

        let width = (max_x - min_x) as u32;
        let height = (max_y - min_y) as u32;
        let mut coverage = vec![0u8; (width * height) as usize];

        for g in &glyphs {
            let ox = (g.x - min_x) as usize;
            let oy = (g.y - min_y) as usize;
            for gy in 0..g.height {
                let row = (oy + gy) * width as usize + ox;
                for gx in 0..g.width {
                    let src = g.bitmap[gy * g.width + gx];
                    let dst = &mut coverage[row + gx];
                    *dst = (*dst).max(src);
                }
            }
        }

        LineMask {
            width,
            height,
            origin_x: min_x,
            baseline: -min_y,
            coverage,
        }
    }

    /// Glyph bitmap positioned relative to the pen origin (y grows downward).
    fn rasterize_glyph(&self, ch: char, pen_x: f32) -> Option<PlacedGlyph> {
        if ch.is_whitespace() {
            return None;
        }
        match self.face.as_ref() {
            Face::Outline(font) => {
                let (metrics, bitmap) = font.rasterize(ch, self.size_px);
                if metrics.width == 0 || metrics.height == 0 {
                    return None;
                }
                Some(PlacedGlyph {
                    x: pen_x.round() as i32 + metrics.xmin,
                    y: -(metrics.height as i32 + metrics.ymin),
                    width: metrics.width,
                    height: metrics.height,
                    bitmap,
                })
            }
            Face::Placeholder => {
                let advance = placeholder_advance(ch, self.size_px);
                let width = ((advance * 0.8).round() as usize).max(1);
                let height = ((self.size_px * 0.7).round() as usize).max(1);
                let border = ((self.size_px / 12.0).round() as usize).max(1);
                let mut bitmap = vec![0u8; width * height];
                for y in 0..height {
                    for x in 0..width {
                        let edge = x < border || y < border || x + border >= width || y + border >= height;
                        if edge {
                            bitmap[y * width + x] = 255;
                        }
                    }
                }
                Some(PlacedGlyph {
                    x: (pen_x + advance * 0.1).round() as i32,
                    y: -(height as i32),
                    width,
                    height,
                    bitmap,
                })
            }
        }
    }
}

struct PlacedGlyph {
    x: i32,
    y: i32,
    width: usize,
    height: usize,
    bitmap: Vec<u8>,
}

fn placeholder_advance(ch: char, size_px: f32) -> f32 {
    if ch.is_whitespace() {
        size_px * PLACEHOLDER_SPACE_ADVANCE
    } else {
        size_px * PLACEHOLDER_ADVANCE
    }
}
