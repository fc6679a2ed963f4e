//! Shared data models for the text overlay service.
//!
//! This crate provides Serde-serializable types for:
//! - Overlay style descriptors and the fixed three-slot style set
//! - Frame geometry (canvas size, safe zones, pixel rectangles)
//! - Video jobs and request payloads
//! - Encoding configuration

pub mod color;
pub mod encoding;
pub mod error;
pub mod frame;
pub mod job;
pub mod request;
pub mod style;

// Re-export common types
pub use color::Rgba;
pub use encoding::EncodingConfig;
pub use error::{ModelError, ModelResult};
pub use frame::{FrameSize, PixelRect, SafeZones};
pub use job::{JobId, VideoJob};
pub use request::{OverlayTexts, MAX_TEXT_CHARS, OVERLAY_COUNT};
pub use style::{RenderMode, Slot, StyleDescriptor, StyleSet, VerticalAnchor};
