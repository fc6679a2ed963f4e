//! Model validation errors.

use thiserror::Error;

/// Result type for model construction and validation.
pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("Invalid color '{0}': expected #RRGGBB or #RRGGBBAA")]
    InvalidColor(String),

    #[error("Style '{slot}' sets both a background and a stroke")]
    ConflictingStyle { slot: String },

    #[error("Style '{slot}' is invalid: {reason}")]
    InvalidStyle { slot: String, reason: String },

    #[error("Expected exactly {expected} texts, got {actual}")]
    TextCount { expected: usize, actual: usize },

    #[error("Text {index} is {actual} characters long; the limit is {max}")]
    TextTooLong { index: usize, max: usize, actual: usize },

    #[error("Texts must be a JSON array of strings: {0}")]
    TextsFormat(String),
}
