//! Integration tests for copytrade-ingestion.
//!
//! These drive the supervisor end to end:
//! - real `UserFillsClient` against a local mock Hyperliquid server
//! - `MockSignalSink` in place of Kafka
//! - `StaticInfluencerSource` in place of Redis

pub mod common;
