//! Process wiring.
//!
//! `run_ingestion` is the collaborator-agnostic core used by both the binary
//! and the integration tests; `Application` builds the production
//! collaborators around it and owns their shutdown.

use copytrade_bus::{DynSignalSink, KafkaSignalPublisher, SignalSink};
use copytrade_registry::{DynInfluencerSource, InfluencerSource, RedisInfluencerRegistry};
use copytrade_telemetry::serve_metrics;
use copytrade_ws::{DynAccountStream, UserFillsClient};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::supervisor::{StreamSupervisor, SupervisorSettings};

/// Read the influencer set once and supervise one stream per influencer
/// until `cancel` fires.
///
/// Returns `Ok(())` straight away when the registry is empty. Registry
/// errors are returned to the caller.
pub async fn run_ingestion(
    source: DynInfluencerSource,
    stream: DynAccountStream,
    sink: DynSignalSink,
    settings: SupervisorSettings,
    cancel: CancellationToken,
) -> AppResult<()> {
    let influencers = source.list().await?;
    if influencers.is_empty() {
        info!("no influencers configured; exiting");
        return Ok(());
    }

    info!(
        count = influencers.len(),
        ids = ?influencers.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(),
        "Starting ingestion"
    );

    StreamSupervisor::new(stream, sink, settings)
        .run(influencers, cancel)
        .await;
    Ok(())
}

/// Production application.
pub struct Application {
    config: AppConfig,
}

impl Application {
    /// Create an application from validated configuration.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Connect collaborators, ingest until `cancel` fires, then close the
    /// publisher and registry.
    pub async fn run(&self, cancel: CancellationToken) -> AppResult<()> {
        let registry =
            Arc::new(RedisInfluencerRegistry::connect(&self.config.registry_config()).await?);
        let publisher = match KafkaSignalPublisher::new(&self.config.publisher_config()) {
            Ok(publisher) => Arc::new(publisher),
            Err(e) => {
                registry.close();
                return Err(e.into());
            }
        };
        let stream: DynAccountStream =
            Arc::new(UserFillsClient::new(self.config.stream_config()));

        let exporter_cancel = cancel.child_token();
        let exporter = self.spawn_metrics_exporter(exporter_cancel.clone())?;

        let result = run_ingestion(
            registry.clone(),
            stream,
            publisher.clone(),
            self.config.supervisor_settings(),
            cancel,
        )
        .await;

        info!("Shutting down");
        self.close_publisher(publisher).await;
        registry.close();

        exporter_cancel.cancel();
        if let Some(handle) = exporter {
            if let Err(e) = handle.await {
                warn!(error = %e, "Metrics exporter task failed");
            }
        }

        result
    }

    fn spawn_metrics_exporter(
        &self,
        cancel: CancellationToken,
    ) -> AppResult<Option<JoinHandle<()>>> {
        let Some(addr) = self.config.metrics_socket_addr()? else {
            return Ok(None);
        };
        Ok(Some(tokio::spawn(async move {
            if let Err(e) = serve_metrics(addr, cancel).await {
                warn!(error = %e, %addr, "Metrics exporter stopped with error");
            }
        })))
    }

    /// Flush buffered signals. librdkafka's flush blocks, so it runs off the
    /// async workers.
    async fn close_publisher(&self, publisher: Arc<KafkaSignalPublisher>) {
        let grace = self.config.shutdown_grace();
        match tokio::task::spawn_blocking(move || publisher.close(grace)).await {
            Ok(Ok(())) => info!("Signal publisher closed"),
            Ok(Err(e)) => warn!(error = %e, "Failed to close signal publisher"),
            Err(e) => warn!(error = %e, "Signal publisher close task failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use copytrade_bus::MockSignalSink;
    use copytrade_core::Influencer;
    use copytrade_registry::{RegistryError, StaticInfluencerSource};
    use copytrade_ws::StreamConfig;

    fn unreachable_stream() -> DynAccountStream {
        Arc::new(UserFillsClient::new(StreamConfig {
            url: "ws://127.0.0.1:1".to_string(),
            ..Default::default()
        }))
    }

    #[tokio::test]
    async fn test_empty_registry_returns_ok() {
        let source = Arc::new(StaticInfluencerSource::new(Vec::new()));
        let sink = Arc::new(MockSignalSink::new());

        let result = run_ingestion(
            source,
            unreachable_stream(),
            sink.clone(),
            SupervisorSettings::default(),
            CancellationToken::new(),
        )
        .await;

        tokio_test::assert_ok!(result);
        assert!(sink.records().is_empty());
    }

    #[tokio::test]
    async fn test_registry_error_is_fatal() {
        let source = Arc::new(StaticInfluencerSource::failing("connection refused"));
        let result = run_ingestion(
            source,
            unreachable_stream(),
            Arc::new(MockSignalSink::new()),
            SupervisorSettings::default(),
            CancellationToken::new(),
        )
        .await;

        let err = tokio_test::assert_err!(result);
        assert!(matches!(
            err,
            crate::AppError::Registry(RegistryError::Unavailable(_))
        ));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_returns_on_cancel_while_reconnecting() {
        let source = Arc::new(StaticInfluencerSource::new(vec![Influencer::new(
            "i1", "0xabc",
        )]));
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            canceller.cancel();
        });

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            run_ingestion(
                source,
                unreachable_stream(),
                Arc::new(MockSignalSink::new()),
                SupervisorSettings::default(),
                cancel,
            ),
        )
        .await;

        assert!(matches!(result, Ok(Ok(()))));
    }

    #[test]
    fn test_application_rejects_invalid_config() {
        let config = AppConfig {
            influencer_set_key: String::new(),
            ..Default::default()
        };
        assert!(Application::new(config).is_err());
        assert!(Application::new(AppConfig::default()).is_ok());
    }
}
