//! WebSocket client for Hyperliquid account fill streams.
//!
//! Provides one-session-per-call streaming with:
//! - `userFills` subscription for a single account address
//! - In-order delivery of each fill batch to a `FillHandler`
//! - Application-level heartbeat (`{"method":"ping"}`) with timeout detection
//! - Cooperative cancellation that closes the socket

pub mod client;
pub mod error;
pub mod handler;
pub mod heartbeat;
pub mod message;

pub use client::{AccountStream, DynAccountStream, StreamConfig, UserFillsClient};
pub use error::{HandlerError, WsError, WsResult};
pub use handler::FillHandler;
pub use heartbeat::Heartbeat;
pub use message::{
    user_fills_subscription, ChannelMessage, FillPayload, PongMessage, UserFillsPayload,
    WsMessage, WsRequest,
};
