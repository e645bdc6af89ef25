//! Copy-trading signal ingestion service.
//!
//! Reads tracked influencers from Redis, streams each account's fills from
//! Hyperliquid, normalizes them into signals and publishes them to Kafka.

pub mod app;
pub mod config;
pub mod error;
pub mod supervisor;

pub use app::{run_ingestion, Application};
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use supervisor::{StreamSupervisor, SupervisorSettings, TaskState};
