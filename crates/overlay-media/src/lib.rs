#![deny(unreachable_patterns)]
//! Text overlay compositor and FFmpeg merge pipeline.
//!
//! This crate provides:
//! - Font resolution with degraded-mode fallbacks
//! - Greedy word-wrap text layout against a pixel budget
//! - Bubble and stroke overlay rasterisation
//! - Safe-zone placement and flattening of the three overlays
//! - Type-safe FFmpeg command building, probing and the video merge
//! - Per-job temporary workspaces

pub mod command;
pub mod compose;
pub mod error;
pub mod filters;
pub mod font;
pub mod layout;
pub mod merge;
pub mod overlay;
pub mod probe;
pub mod progress;
pub mod render;
pub mod workspace;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use compose::{compose, CompositeOverlay, Placement};
pub use error::{MediaError, MediaResult};
pub use font::{FontHandle, FontResolver, FontSource, DEFAULT_FONT_PATH};
pub use layout::{layout, max_text_width, TextBlock};
pub use merge::{merge, prepare_job, MergeOptions};
pub use overlay::OverlayBuilder;
pub use probe::{probe_video, VideoInfo};
pub use progress::{FfmpegProgress, ProgressLine};
pub use render::{render, OverlayImage};
pub use workspace::{sweep_stale_workspaces, JobWorkspace};
