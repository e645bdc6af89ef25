//! WebSocket error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WsError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection closed: code={code}, reason={reason}")]
    ConnectionClosed { code: u16, reason: String },

    #[error("Subscription failed: {0}")]
    SubscriptionFailed(String),

    #[error("Message parse error: {0}")]
    Parse(String),

    #[error("Heartbeat timeout")]
    HeartbeatTimeout,

    #[error("Stream cancelled")]
    Cancelled,

    #[error("Tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WsError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

pub type WsResult<T> = Result<T, WsError>;

/// Outcome reported by a fill handler.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// The handler observed cancellation; not an operational failure.
    #[error("handler cancelled")]
    Cancelled,

    #[error("{0}")]
    Failed(String),
}
