//! Prometheus metrics and structured logging for copy-trading ingestion.
//!
//! - Structured logging with tracing (JSON in production, pretty otherwise)
//! - Prometheus counters and gauges for the ingestion pipeline
//! - Optional HTTP exporter serving `/metrics` and `/healthz`

pub mod error;
pub mod exporter;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use exporter::{serve_metrics, serve_metrics_on};
pub use logging::init_logging;
pub use metrics::Metrics;
