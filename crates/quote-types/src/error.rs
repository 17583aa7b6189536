//! Common error types shared across crates

use thiserror::Error;

/// Common result type
pub type Result<T> = std::result::Result<T, CommonError>;

/// Errors that can occur while building or checking shared types
#[derive(Error, Debug)]
pub enum CommonError {
    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Timestamp could not be parsed
    #[error("Invalid timestamp '{value}': {reason}")]
    InvalidTimestamp { value: String, reason: String },
}

impl CommonError {
    pub fn validation<T: Into<String>>(msg: T) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_timestamp<V: Into<String>, R: ToString>(value: V, reason: R) -> Self {
        Self::InvalidTimestamp {
            value: value.into(),
            reason: reason.to_string(),
        }
    }
}
