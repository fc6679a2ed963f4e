//! API configuration.

use std::path::PathBuf;
use std::time::Duration;

use overlay_models::encoding::{DEFAULT_CRF, DEFAULT_PRESET};
use overlay_models::EncodingConfig;

/// Default upload cap (50 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Rate limit requests per second (per client IP)
    pub rate_limit_rps: u32,
    /// Max size of the uploaded video
    pub max_upload_bytes: usize,
    /// Whether `/metrics` is served
    pub metrics_enabled: bool,
    pub processing: ProcessingConfig,
}

/// Settings for the overlay pipeline.
#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    /// Root under which per-job workspaces are created
    pub work_dir: PathBuf,
    /// Overlay font; the built-in default path when unset
    pub font_path: Option<PathBuf>,
    /// Wall-clock budget for the FFmpeg merge
    pub timeout: Duration,
    /// Merges allowed to run at once
    pub max_concurrent_jobs: usize,
    /// Admitted jobs allowed to wait for a merge slot
    pub max_queued_jobs: usize,
    pub encoding: EncodingConfig,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir().join("text-overlay"),
            font_path: None,
            timeout: Duration::from_secs(300),
            max_concurrent_jobs: 2,
            max_queued_jobs: 8,
            encoding: EncodingConfig::default(),
        }
    }
}

impl ProcessingConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            work_dir: std::env::var("WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            font_path: std::env::var("FONT_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            timeout: Duration::from_secs(
                std::env::var("PROCESSING_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
            max_concurrent_jobs: std::env::var("MAX_CONCURRENT_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(2),
            max_queued_jobs: std::env::var("MAX_QUEUED_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8),
            encoding: EncodingConfig::default()
                .with_preset(std::env::var("ENCODING_PRESET").unwrap_or_else(|_| DEFAULT_PRESET.to_string()))
                .with_crf(
                    std::env::var("ENCODING_CRF")
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(DEFAULT_CRF),
                ),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 10,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            metrics_enabled: true,
            processing: ProcessingConfig::default(),
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3000),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|_| vec!["*".to_string()]),
            rate_limit_rps: std::env::var("RATE_LIMIT_RPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            max_upload_bytes: std::env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
            processing: ProcessingConfig::from_env(),
        }
    }
}
