//! Multipart form reading shared by the upload endpoints.
//!
//! The video part is streamed straight into a fresh job workspace; it is
//! never buffered whole in memory.

use std::path::Path;

use axum::extract::multipart::Field;
use axum::extract::Multipart;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use overlay_models::JobId;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::services::{OverlayService, UploadedVideo};

/// Form field carrying the video.
pub const VIDEO_FIELD: &str = "video";
/// Form field carrying the JSON array of overlay texts.
pub const TEXTS_FIELD: &str = "texts";

const ALLOWED_CONTENT_TYPES: &[&str] = &["video/mp4", "video/quicktime", "video/x-msvideo"];
const ALLOWED_EXTENSIONS: &[&str] = &["mp4", "mov", "avi"];

/// Fields collected from one multipart request.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub video: Option<UploadedVideo>,
    pub texts: Option<String>,
}

impl UploadForm {
    pub fn require_video(&mut self) -> ApiResult<UploadedVideo> {
        self.video
            .take()
            .ok_or_else(|| ApiError::input(format!("Missing required field: {}", VIDEO_FIELD)))
    }

    pub fn require_texts(&mut self) -> ApiResult<String> {
        self.texts
            .take()
            .ok_or_else(|| ApiError::input(format!("Missing required field: {}", TEXTS_FIELD)))
    }
}

/// Drain `multipart`, streaming the video to disk and keeping `texts`.
///
/// Unknown fields are skipped. Exceeding `max_bytes` aborts with
/// `ResourceLimit`, and the partial upload is removed with its workspace.
pub async fn read_form(
    service: &OverlayService,
    multipart: &mut Multipart,
    max_bytes: usize,
) -> ApiResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(VIDEO_FIELD) => {
                if form.video.is_some() {
                    return Err(ApiError::input("Only one video file may be uploaded"));
                }
                form.video = Some(save_video(service, field, max_bytes).await?);
            }
            Some(TEXTS_FIELD) => {
                form.texts = Some(field.text().await?);
            }
            other => {
                debug!(field = ?other, "Ignoring unexpected form field");
            }
        }
    }

    Ok(form)
}

async fn save_video(service: &OverlayService, mut field: Field<'_>, max_bytes: usize) -> ApiResult<UploadedVideo> {
    let filename = field.file_name().unwrap_or("upload.mp4").to_string();
    let extension = file_extension(&filename);
    check_content_type(field.content_type(), extension.as_deref())?;

    let workspace = service.create_workspace(&JobId::new())?;
    let source_path = workspace.source_path(extension.as_deref());

    let mut file = tokio::fs::File::create(&source_path)
        .await
        .map_err(|e| ApiError::internal("upload", format!("cannot create upload file: {}", e)))?;

    let mut size_bytes: u64 = 0;
    while let Some(chunk) = field.chunk().await? {
        size_bytes += chunk.len() as u64;
        if size_bytes > max_bytes as u64 {
            warn!(filename = %filename, size_bytes, "Upload exceeded the size limit");
            metrics::record_job_failed("upload");
            return Err(ApiError::too_large(max_bytes));
        }
        file.write_all(&chunk)
            .await
            .map_err(|e| ApiError::internal("upload", format!("cannot write upload: {}", e)))?;
    }
    file.flush()
        .await
        .map_err(|e| ApiError::internal("upload", format!("cannot flush upload: {}", e)))?;

    if size_bytes == 0 {
        return Err(ApiError::input("Uploaded video is empty"));
    }

    metrics::record_upload_size(size_bytes);
    debug!(job_id = %workspace.job_id(), filename = %filename, size_bytes, "Stored upload");

    Ok(UploadedVideo {
        workspace,
        source_path,
        filename,
        size_bytes,
    })
}

fn file_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
}

/// Accept known video types, or a generic binary type with a video extension.
fn check_content_type(content_type: Option<&str>, extension: Option<&str>) -> ApiResult<()> {
    let essence = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase());

    let has_video_extension = extension.is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext));

    match essence.as_deref() {
        Some(ct) if ALLOWED_CONTENT_TYPES.contains(&ct) => Ok(()),
        Some("application/octet-stream") | None if has_video_extension => Ok(()),
        Some(ct) => Err(ApiError::unsupported(format!(
            "Content type '{}' is not supported. Upload MP4, MOV or AVI",
            ct
        ))),
        None => Err(ApiError::unsupported("Upload MP4, MOV or AVI")),
    }
}
