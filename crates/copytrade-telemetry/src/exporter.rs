//! HTTP exporter for Prometheus scraping.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::TelemetryResult;
use crate::metrics::Metrics;

/// Bind `addr` and serve until `shutdown` is cancelled.
pub async fn serve_metrics(addr: SocketAddr, shutdown: CancellationToken) -> TelemetryResult<()> {
    let listener = TcpListener::bind(addr).await?;
    serve_metrics_on(listener, shutdown).await
}

/// Serve on an already-bound listener until `shutdown` is cancelled.
pub async fn serve_metrics_on(
    listener: TcpListener,
    shutdown: CancellationToken,
) -> TelemetryResult<()> {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(|| async { "ok" }));

    info!(addr = ?listener.local_addr().ok(), "Metrics exporter listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    info!("Metrics exporter stopped");
    Ok(())
}

async fn metrics_handler() -> Response {
    match Metrics::render() {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
