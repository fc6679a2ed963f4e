//! Per-request video job.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::frame::FrameSize;

/// Unique identifier for a job. Doubles as the correlation id in error responses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One overlay request's video work. Lives exactly as long as its workspace.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VideoJob {
    pub id: JobId,
    /// Uploaded source file inside the job workspace
    pub source_path: PathBuf,
    /// Encoded result inside the job workspace
    pub output_path: PathBuf,
    /// Output canvas
    pub frame: FrameSize,
    /// Source dimensions as probed
    pub source_size: FrameSize,
    pub duration_seconds: f64,
    /// Source frame rate, passed through to the output
    pub fps: f64,
    pub audio_present: bool,
    #[serde(default)]
    pub audio_codec: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl VideoJob {
    /// True when the source must be scaled/cropped onto the canvas.
    pub fn needs_canvas_fit(&self) -> bool {
        self.source_size != self.frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_ids_are_unique() {
        assert_ne!(JobId::new(), JobId::new());
        assert_eq!(JobId::from_string("abc").to_string(), "abc");
    }

    #[test]
    fn test_needs_canvas_fit() {
        let mut job = VideoJob {
            id: JobId::new(),
            source_path: PathBuf::from("in.mp4"),
            output_path: PathBuf::from("out.mp4"),
            frame: FrameSize::PORTRAIT,
            source_size: FrameSize::PORTRAIT,
            duration_seconds: 10.0,
            fps: 30.0,
            audio_present: true,
            audio_codec: Some("aac".to_string()),
            created_at: Utc::now(),
        };
        assert!(!job.needs_canvas_fit());
        job.source_size = FrameSize::new(1920, 1080);
        assert!(job.needs_canvas_fit());
    }
}
