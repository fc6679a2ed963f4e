//! Axum HTTP API for the text overlay service.
//!
//! This crate provides:
//! - The `/add-text-overlay` upload, render and download flow
//! - Bounded job admission in front of the FFmpeg merge
//! - Rate limiting and security headers
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub use config::{ApiConfig, ProcessingConfig};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::{JobGate, OverlayService};
pub use state::AppState;
