//! Text overlay endpoint.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Multipart, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use futures_util::stream::{self, Stream};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

use overlay_media::JobWorkspace;
use overlay_models::OverlayTexts;

use crate::error::{ApiError, ApiResult};
use crate::handlers::upload::read_form;
use crate::services::RenderedVideo;
use crate::state::AppState;

/// Filename offered to the client for the rendered video.
pub const OUTPUT_FILENAME: &str = "video-with-overlay.mp4";

const RESPONSE_CHUNK_BYTES: usize = 64 * 1024;

/// Burn three text overlays into the uploaded video and return the MP4.
///
/// Capacity is reserved before the body is read, so a full server turns
/// requests away without accepting their uploads. The job runs on its own
/// task: a client that disconnects does not cancel it.
pub async fn add_text_overlay(State(state): State<AppState>, mut multipart: Multipart) -> ApiResult<Response> {
    let admission = state.overlay.admit()?;

    let mut form = read_form(&state.overlay, &mut multipart, state.config.max_upload_bytes).await?;
    let upload = form.require_video()?;
    let texts = OverlayTexts::parse_json(&form.require_texts()?)?;

    let service = Arc::clone(&state.overlay);
    let rendered = tokio::spawn(async move { service.process(admission, upload, texts).await })
        .await
        .map_err(|e| ApiError::internal("process", format!("job task failed: {}", e)))??;

    video_response(rendered).await
}

async fn video_response(rendered: RenderedVideo) -> ApiResult<Response> {
    let RenderedVideo {
        workspace,
        path,
        size_bytes,
    } = rendered;

    let file = File::open(&path)
        .await
        .map_err(|e| ApiError::internal("respond", format!("cannot open output: {}", e)))?;

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", OUTPUT_FILENAME))
        .map_err(|e| ApiError::internal("respond", e.to_string()))?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "video/mp4")
        .header(header::CONTENT_DISPOSITION, disposition)
        .header(header::CONTENT_LENGTH, size_bytes)
        .body(Body::from_stream(file_stream(file, workspace)))
        .map_err(|e| ApiError::internal("respond", e.to_string()))
}

/// Stream `file` in chunks. The workspace lives until the last chunk is
/// sent, or until the body is dropped on disconnect.
fn file_stream(file: File, workspace: JobWorkspace) -> impl Stream<Item = std::io::Result<Vec<u8>>> + Send + 'static {
    stream::unfold(Some((file, workspace)), |state| async move {
        let (mut file, workspace) = state?;
        let mut buf = vec![0u8; RESPONSE_CHUNK_BYTES];

        match file.read(&mut buf).await {
            Ok(0) => {
                drop(file);
                let job_id = workspace.job_id().clone();
                if let Err(e) = workspace.close() {
                    warn!(job_id = %job_id, "Failed to remove job workspace: {}", e);
                } else {
                    debug!(job_id = %job_id, "Response sent, workspace removed");
                }
                None
            }
            Ok(n) => {
                buf.truncate(n);
                Some((Ok(buf), Some((file, workspace))))
            }
            Err(e) => {
                warn!(job_id = %workspace.job_id(), "Failed to read rendered video: {}", e);
                Some((Err(e), None))
            }
        }
    })
}
