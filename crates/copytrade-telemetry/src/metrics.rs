//! Prometheus metrics for the ingestion pipeline.
//!
//! All series are labelled by `influencer_id` where a per-account view is
//! useful, so one noisy account is visible without log digging.
//!
//! # Panics
//!
//! Registration uses `unwrap()`: a failure means a duplicate metric name,
//! which is a programming error surfaced on first use at startup.

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter_vec, register_int_gauge, register_int_gauge_vec,
    Encoder, Histogram, IntCounterVec, IntGauge, IntGaugeVec, TextEncoder,
};

use crate::error::TelemetryResult;

/// Fills delivered by the exchange stream.
pub static FILLS_RECEIVED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "copytrade_fills_received_total",
        "Fills delivered by the exchange stream",
        &["influencer_id"]
    )
    .unwrap()
});

/// Signals acknowledged by the bus.
pub static SIGNALS_PUBLISHED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "copytrade_signals_published_total",
        "Signals acknowledged by the bus",
        &["influencer_id", "action"]
    )
    .unwrap()
});

pub static PUBLISH_ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "copytrade_publish_errors_total",
        "Signals dropped because publishing failed or timed out",
        &["influencer_id"]
    )
    .unwrap()
});

pub static NORMALIZE_ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "copytrade_normalize_errors_total",
        "Fills dropped because they could not be normalized",
        &["influencer_id"]
    )
    .unwrap()
});

pub static SIGNALS_FILTERED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "copytrade_signals_filtered_total",
        "Signals dropped by the influencer market filter",
        &["influencer_id"]
    )
    .unwrap()
});

pub static STREAM_RECONNECTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "copytrade_stream_reconnects_total",
        "Stream sessions that ended with an error and entered backoff",
        &["influencer_id"]
    )
    .unwrap()
});

/// Current per-task state as a number (see `TaskState::as_metric`).
pub static STREAM_STATE: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "copytrade_stream_state",
        "Per-influencer stream task state",
        &["influencer_id"]
    )
    .unwrap()
});

pub static ACTIVE_STREAMS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("copytrade_active_streams", "Running stream tasks").unwrap()
});

pub static PUBLISH_LATENCY_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "copytrade_publish_latency_seconds",
        "Time from publish call to bus acknowledgement",
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .unwrap()
});

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    pub fn fill_received(influencer_id: &str) {
        FILLS_RECEIVED_TOTAL.with_label_values(&[influencer_id]).inc();
    }

    pub fn signal_published(influencer_id: &str, action: &str, latency_secs: f64) {
        SIGNALS_PUBLISHED_TOTAL
            .with_label_values(&[influencer_id, action])
            .inc();
        PUBLISH_LATENCY_SECONDS.observe(latency_secs);
    }

    pub fn publish_failed(influencer_id: &str) {
        PUBLISH_ERRORS_TOTAL.with_label_values(&[influencer_id]).inc();
    }

    pub fn normalize_failed(influencer_id: &str) {
        NORMALIZE_ERRORS_TOTAL.with_label_values(&[influencer_id]).inc();
    }

    pub fn signal_filtered(influencer_id: &str) {
        SIGNALS_FILTERED_TOTAL.with_label_values(&[influencer_id]).inc();
    }

    pub fn stream_reconnect(influencer_id: &str) {
        STREAM_RECONNECTS_TOTAL.with_label_values(&[influencer_id]).inc();
    }

    pub fn stream_state(influencer_id: &str, state: i64) {
        STREAM_STATE.with_label_values(&[influencer_id]).set(state);
    }

    pub fn stream_started() {
        ACTIVE_STREAMS.inc();
    }

    pub fn stream_stopped() {
        ACTIVE_STREAMS.dec();
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_increment() {
        let before = FILLS_RECEIVED_TOTAL.with_label_values(&["metrics-test"]).get();
        Metrics::fill_received("metrics-test");
        Metrics::fill_received("metrics-test");
        let after = FILLS_RECEIVED_TOTAL.with_label_values(&["metrics-test"]).get();
        assert_eq!(after - before, 2);
    }

    #[test]
    fn test_stream_state_gauge() {
        Metrics::stream_state("metrics-state", 3);
        assert_eq!(STREAM_STATE.with_label_values(&["metrics-state"]).get(), 3);
    }

    #[test]
    fn test_render_contains_registered_series() {
        Metrics::signal_published("metrics-render", "OPEN", 0.01);
        let text = Metrics::render().unwrap();
        assert!(text.contains("copytrade_signals_published_total"));
        assert!(text.contains("influencer_id=\"metrics-render\""));
    }
}
