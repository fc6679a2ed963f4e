//! Service information, probing and the JSON 404.

use axum::extract::{Multipart, State};
use axum::http::Uri;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use serde_json::json;
use tracing::info;

use overlay_models::{MAX_TEXT_CHARS, OVERLAY_COUNT};

use crate::error::{ApiError, ApiResult};
use crate::handlers::health::SERVICE_NAME;
use crate::handlers::upload::read_form;
use crate::state::AppState;

/// Public routes, as listed in the root catalogue and 404 bodies.
pub const ENDPOINTS: &[&str] = &[
    "GET /",
    "GET /health",
    "GET /healthz",
    "GET /metrics",
    "POST /add-text-overlay",
    "POST /video-info",
];

/// Service information.
pub async fn root(State(state): State<AppState>) -> impl IntoResponse {
    let frame = state.overlay.frame();
    Json(json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Burns three styled text overlays into short portrait videos",
        "output": {
            "width": frame.width,
            "height": frame.height,
            "format": "mp4",
        },
        "limits": {
            "max_upload_bytes": state.config.max_upload_bytes,
            "texts": OVERLAY_COUNT,
            "max_text_chars": MAX_TEXT_CHARS,
        },
        "endpoints": ENDPOINTS,
    }))
}

/// Metadata for an uploaded video.
#[derive(Debug, Serialize)]
pub struct VideoInfoResponse {
    pub filename: String,
    pub size_bytes: u64,
    pub duration_seconds: f64,
    pub width: u32,
    pub height: u32,
    /// Clockwise display rotation; width and height already account for it
    pub rotation: u32,
    pub fps: f64,
    pub has_audio: bool,
}

/// Probe an uploaded video without rendering anything.
///
/// Spools the upload and runs ffprobe, so it holds a job admission like
/// `/add-text-overlay` does.
pub async fn video_info(State(state): State<AppState>, mut multipart: Multipart) -> ApiResult<Json<VideoInfoResponse>> {
    let _admission = state.overlay.admit()?;

    let mut form = read_form(&state.overlay, &mut multipart, state.config.max_upload_bytes).await?;
    let upload = form.require_video()?;

    let probe = state.overlay.probe(&upload).await?;
    info!(
        job_id = %upload.workspace.job_id(),
        width = probe.width,
        height = probe.height,
        duration = probe.duration,
        "Probed uploaded video"
    );

    Ok(Json(VideoInfoResponse {
        filename: upload.filename.clone(),
        size_bytes: upload.size_bytes,
        duration_seconds: probe.duration,
        width: probe.width,
        height: probe.height,
        rotation: probe.rotation,
        fps: probe.fps,
        has_audio: probe.has_audio,
    }))
}

/// Fallback for unknown routes.
pub async fn not_found(uri: Uri) -> impl IntoResponse {
    let err = ApiError::not_found(format!("No route for {}", uri.path()));
    (
        err.status_code(),
        Json(json!({
            "error": err.code(),
            "detail": err.to_string(),
            "available_endpoints": ENDPOINTS,
        })),
    )
}
