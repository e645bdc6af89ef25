//! Bus error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("Decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Publish failed: {0}")]
    Publish(String),
}

pub type BusResult<T> = Result<T, BusError>;
