//! Application configuration.
//!
//! Values come from an optional TOML file overlaid by environment variables.
//! Variable names are the upper-case field names (`REDIS_ADDR`,
//! `KAFKA_BROKERS`, ...); empty variables are ignored.

use copytrade_bus::PublisherConfig;
use copytrade_registry::{connection_info, RegistryConfig};
use copytrade_ws::StreamConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::supervisor::SupervisorSettings;

/// Process configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Redis endpoint, `host:port`.
    #[serde(default = "default_redis_addr")]
    pub redis_addr: String,
    #[serde(default)]
    pub redis_password: String,
    #[serde(default)]
    pub redis_db: i64,
    /// Comma-separated broker addresses.
    #[serde(default = "default_kafka_brokers")]
    pub kafka_brokers: String,
    #[serde(default = "default_kafka_topic")]
    pub kafka_topic_influencer_signals: String,
    #[serde(default = "default_ws_url")]
    pub hyperliquid_ws_url: String,
    /// Redis SET holding influencer JSON blobs.
    #[serde(default = "default_influencer_set_key")]
    pub influencer_set_key: String,

    /// Delay before a failed stream reconnects.
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,
    /// Upper bound on a single publish.
    #[serde(default = "default_publish_timeout_secs")]
    pub publish_timeout_secs: u64,
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    /// Forward the snapshot batch the exchange replays after each subscribe.
    #[serde(default)]
    pub include_snapshot_fills: bool,
    /// Prometheus exporter bind address. Empty disables the exporter.
    #[serde(default)]
    pub metrics_addr: String,
    /// How long shutdown waits for stream tasks before aborting them.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

fn default_redis_addr() -> String {
    "localhost:6379".to_string()
}

fn default_kafka_brokers() -> String {
    "localhost:9092".to_string()
}

fn default_kafka_topic() -> String {
    "influencer_signals".to_string()
}

fn default_ws_url() -> String {
    "wss://api.hyperliquid.xyz/ws".to_string()
}

fn default_influencer_set_key() -> String {
    "ingestion:influencers:primary".to_string()
}

fn default_backoff_secs() -> u64 {
    5
}

fn default_publish_timeout_secs() -> u64 {
    5
}

fn default_heartbeat_interval_secs() -> u64 {
    30
}

fn default_shutdown_grace_secs() -> u64 {
    10
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            redis_addr: default_redis_addr(),
            redis_password: String::new(),
            redis_db: 0,
            kafka_brokers: default_kafka_brokers(),
            kafka_topic_influencer_signals: default_kafka_topic(),
            hyperliquid_ws_url: default_ws_url(),
            influencer_set_key: default_influencer_set_key(),
            backoff_secs: default_backoff_secs(),
            publish_timeout_secs: default_publish_timeout_secs(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            include_snapshot_fills: false,
            metrics_addr: String::new(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

impl AppConfig {
    /// Load from the optional file at `path`, then the process environment.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        Self::load_from(path, None)
    }

    /// Load with an explicit environment map in place of the process
    /// environment when `env` is `Some`.
    pub fn load_from(
        path: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> AppResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }
        builder = builder.add_source(
            config::Environment::default()
                .ignore_empty(true)
                .source(env),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Broker addresses, trimmed, empty entries dropped.
    pub fn kafka_broker_list(&self) -> Vec<String> {
        self.kafka_brokers
            .split(',')
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.influencer_set_key.trim().is_empty() {
            return Err(AppError::Config(
                "INFLUENCER_SET_KEY must not be empty".to_string(),
            ));
        }
        if self.kafka_broker_list().is_empty() {
            return Err(AppError::Config("KAFKA_BROKERS is empty".to_string()));
        }
        if self.kafka_topic_influencer_signals.trim().is_empty() {
            return Err(AppError::Config(
                "KAFKA_TOPIC_INFLUENCER_SIGNALS must not be empty".to_string(),
            ));
        }
        if self.hyperliquid_ws_url.trim().is_empty() {
            return Err(AppError::Config(
                "HYPERLIQUID_WS_URL must not be empty".to_string(),
            ));
        }
        connection_info(&self.registry_config()).map_err(|e| AppError::Config(e.to_string()))?;

        for (name, value) in [
            ("BACKOFF_SECS", self.backoff_secs),
            ("PUBLISH_TIMEOUT_SECS", self.publish_timeout_secs),
            ("HEARTBEAT_INTERVAL_SECS", self.heartbeat_interval_secs),
            ("SHUTDOWN_GRACE_SECS", self.shutdown_grace_secs),
        ] {
            if value == 0 {
                return Err(AppError::Config(format!("{name} must be greater than zero")));
            }
        }

        self.metrics_socket_addr()?;
        Ok(())
    }

    /// Parsed `metrics_addr`, `None` when the exporter is disabled.
    pub fn metrics_socket_addr(&self) -> AppResult<Option<SocketAddr>> {
        let addr = self.metrics_addr.trim();
        if addr.is_empty() {
            return Ok(None);
        }
        addr.parse()
            .map(Some)
            .map_err(|e| AppError::Config(format!("invalid METRICS_ADDR {addr:?}: {e}")))
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            addr: self.redis_addr.trim().to_string(),
            password: self.redis_password.clone(),
            db: self.redis_db,
            set_key: self.influencer_set_key.trim().to_string(),
        }
    }

    pub fn publisher_config(&self) -> PublisherConfig {
        PublisherConfig {
            brokers: self.kafka_broker_list(),
            topic: self.kafka_topic_influencer_signals.trim().to_string(),
            ..Default::default()
        }
    }

    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            url: self.hyperliquid_ws_url.trim().to_string(),
            heartbeat_interval: Duration::from_secs(self.heartbeat_interval_secs),
            include_snapshots: self.include_snapshot_fills,
        }
    }

    pub fn supervisor_settings(&self) -> SupervisorSettings {
        SupervisorSettings {
            backoff: Duration::from_secs(self.backoff_secs),
            publish_timeout: Duration::from_secs(self.publish_timeout_secs),
            shutdown_grace: self.shutdown_grace(),
        }
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}
