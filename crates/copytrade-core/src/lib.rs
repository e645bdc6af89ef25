//! Core domain types for copy-trading signal ingestion.
//!
//! This crate provides the types shared by every stage of the pipeline:
//! - `Influencer`: a tracked exchange account and its market filter
//! - `Signal`: the normalized, exchange-agnostic position change
//! - `SignalAction`, `SignalSide`, `PositionDirection`: position enums
//! - `numeric`: lenient parsing of numeric strings and literals

pub mod error;
pub mod influencer;
pub mod numeric;
pub mod signal;

pub use error::{CoreError, Result};
pub use influencer::Influencer;
pub use signal::{
    PositionDirection, Signal, SignalAction, SignalSide, EXCHANGE_HYPERLIQUID,
    META_EVENT_TYPE, META_INFLUENCER_ADDRESS, META_RAW, META_SOURCE_EVENT_ID,
};

use std::future::Future;
use std::pin::Pin;

/// Boxed future type used by the dyn-compatible async traits across the workspace.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
