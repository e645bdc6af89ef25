//! Registry error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Invalid registry configuration: {0}")]
    Config(String),

    #[error("Invalid influencer: {0}")]
    InvalidInfluencer(#[from] copytrade_core::CoreError),

    #[error("Registry unavailable: {0}")]
    Unavailable(String),

    #[error("Registry closed")]
    Closed,

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type RegistryResult<T> = Result<T, RegistryError>;
