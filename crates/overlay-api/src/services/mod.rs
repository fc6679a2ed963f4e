//! Business logic services.

pub mod admission;
pub mod overlay;

pub use admission::{Admission, JobGate};
pub use overlay::{OverlayService, RenderedVideo, UploadedVideo};
