//! API error types.

use axum::extract::multipart::MultipartError;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use overlay_media::MediaError;
use overlay_models::ModelError;

pub type ApiResult<T> = Result<T, ApiError>;

/// Seconds a client is asked to wait after a 503.
const BUSY_RETRY_AFTER_SECS: &str = "5";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InputValidation(String),

    #[error("{0}")]
    UnsupportedFormat(String),

    #[error("{0}")]
    ResourceLimit(String),

    #[error("Video processing exceeded {0} seconds")]
    ProcessingTimeout(u64),

    #[error("Server is at capacity, try again shortly")]
    ServerBusy,

    #[error("Rate limit exceeded, try again later")]
    RateLimited,

    #[error("{0}")]
    NotFound(String),

    #[error("Processing failed during {stage}: {message}")]
    Internal {
        stage: &'static str,
        message: String,
        correlation_id: String,
    },
}

impl ApiError {
    pub fn input(msg: impl Into<String>) -> Self {
        Self::InputValidation(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedFormat(msg.into())
    }

    pub fn too_large(limit_bytes: usize) -> Self {
        Self::ResourceLimit(format!(
            "Video exceeds the maximum upload size of {} MB",
            limit_bytes / (1024 * 1024)
        ))
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Internal failure in `stage`; logged here with a fresh correlation id.
    pub fn internal(stage: &'static str, msg: impl Into<String>) -> Self {
        let correlation_id = Uuid::new_v4().to_string();
        let message = msg.into();
        error!(stage, correlation_id = %correlation_id, "Internal processing error: {}", message);
        Self::Internal {
            stage,
            message,
            correlation_id,
        }
    }

    /// Map a media failure, attributing unexpected errors to `stage`.
    pub fn from_media(stage: &'static str, err: MediaError) -> Self {
        match err {
            MediaError::InvalidVideo(msg) => Self::input(format!("Invalid video file: {}", msg)),
            MediaError::UnsupportedFormat(msg) => Self::unsupported(format!("Unsupported video format: {}", msg)),
            MediaError::TextOverflow(msg) => Self::input(format!("Texts do not fit the frame: {}", msg)),
            MediaError::Timeout(limit) => Self::ProcessingTimeout(limit.as_secs() + u64::from(limit.subsec_nanos() > 0)),
            other => Self::internal(stage, other.to_string()),
        }
    }

    /// Error code reported in the `error` field.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InputValidation(_) => "InputValidationError",
            ApiError::UnsupportedFormat(_) => "UnsupportedFormatError",
            ApiError::ResourceLimit(_) => "ResourceLimitError",
            ApiError::ProcessingTimeout(_) => "ProcessingTimeoutError",
            ApiError::ServerBusy => "ServerBusyError",
            ApiError::RateLimited => "RateLimitError",
            ApiError::NotFound(_) => "NotFoundError",
            ApiError::Internal { .. } => "InternalProcessingError",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InputValidation(_) | ApiError::UnsupportedFormat(_) => StatusCode::BAD_REQUEST,
            ApiError::ResourceLimit(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::ProcessingTimeout(_) => StatusCode::REQUEST_TIMEOUT,
            ApiError::ServerBusy => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ModelError> for ApiError {
    fn from(err: ModelError) -> Self {
        ApiError::InputValidation(err.to_string())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::ResourceLimit("Request body exceeds the upload limit".to_string())
        } else {
            ApiError::InputValidation(format!("Malformed multipart body: {}", err.body_text()))
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Internal details stay in the logs
        let (detail, correlation_id) = match &self {
            ApiError::Internal { correlation_id, .. } => (
                "Video processing failed. Please try again later.".to_string(),
                Some(correlation_id.clone()),
            ),
            _ => (self.to_string(), None),
        };

        let body = ErrorResponse {
            error: self.code(),
            detail,
            correlation_id,
        };

        match self {
            ApiError::ServerBusy => (
                status,
                [(header::RETRY_AFTER, BUSY_RETRY_AFTER_SECS)],
                Json(body),
            )
                .into_response(),
            ApiError::RateLimited => (status, [(header::RETRY_AFTER, "1")], Json(body)).into_response(),
            _ => (status, Json(body)).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_media_errors_map_to_client_codes() {
        let err = ApiError::from_media("probe", MediaError::InvalidVideo("no video stream".into()));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "InputValidationError");

        let err = ApiError::from_media("probe", MediaError::UnsupportedFormat("moov atom not found".into()));
        assert_eq!(err.code(), "UnsupportedFormatError");

        let err = ApiError::from_media("compose", MediaError::TextOverflow("1200px > 934px".into()));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "InputValidationError");

        let err = ApiError::from_media("merge", MediaError::Timeout(Duration::from_secs(300)));
        assert_eq!(err.status_code(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(err.to_string(), "Video processing exceeded 300 seconds");

        // Sub-second budgets round up rather than reporting zero
        let err = ApiError::from_media("merge", MediaError::Timeout(Duration::from_millis(250)));
        assert!(matches!(err, ApiError::ProcessingTimeout(1)));
    }

    #[test]
    fn test_internal_errors_carry_stage_and_correlation_id() {
        let err = ApiError::from_media("merge", MediaError::ffmpeg_failed("exit 1", None, Some(1)));
        match &err {
            ApiError::Internal { stage, correlation_id, .. } => {
                assert_eq!(*stage, "merge");
                assert!(!correlation_id.is_empty());
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_busy_response_has_retry_after() {
        let response = ApiError::ServerBusy.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.headers().contains_key(header::RETRY_AFTER));
    }

    #[test]
    fn test_model_error_is_validation() {
        let err: ApiError = ModelError::TextCount { expected: 3, actual: 2 }.into();
        assert_eq!(err.code(), "InputValidationError");

        let err: ApiError = ModelError::TextTooLong { index: 0, max: 80, actual: 81 }.into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("got 2"));
    }
}
