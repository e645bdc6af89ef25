//! Error types for copytrade-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Empty numeric value")]
    EmptyNumber,

    #[error("Missing numeric value")]
    MissingNumber,

    #[error("Invalid numeric value: {0}")]
    InvalidNumber(String),

    #[error("Invalid influencer: {0}")]
    InvalidInfluencer(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
