//! Application state.

use std::sync::Arc;

use tracing::{info, warn};

use overlay_media::{FontResolver, FontSource, OverlayBuilder};
use overlay_models::{ModelResult, StyleSet};

use crate::config::ApiConfig;
use crate::metrics;
use crate::services::OverlayService;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub overlay: Arc<OverlayService>,
}

impl AppState {
    /// Create application state, loading the overlay font from config.
    ///
    /// A missing font degrades rendering instead of failing startup.
    pub fn new(config: ApiConfig) -> ModelResult<Self> {
        let fonts = FontResolver::load(config.processing.font_path.as_deref());
        Self::with_fonts(config, fonts)
    }

    /// Create application state around an already resolved font.
    pub fn with_fonts(config: ApiConfig, fonts: FontResolver) -> ModelResult<Self> {
        if fonts.is_degraded() {
            warn!(source = ?fonts.source(), "Overlay font unavailable, rendering with a fallback");
            metrics::record_font_fallback(font_source_label(&fonts));
        } else {
            info!(source = ?fonts.source(), "Overlay font loaded");
        }

        let styles = StyleSet::default();
        styles.validate()?;

        let builder = OverlayBuilder::new(styles, fonts);
        let overlay = OverlayService::new(&config.processing, builder);

        Ok(Self {
            config: Arc::new(config),
            overlay: Arc::new(overlay),
        })
    }
}

fn font_source_label(fonts: &FontResolver) -> &'static str {
    match fonts.source() {
        FontSource::Primary(_) => "primary",
        FontSource::Fallback(_) => "fallback",
        FontSource::Embedded => "embedded",
        FontSource::Placeholder => "placeholder",
    }
}
