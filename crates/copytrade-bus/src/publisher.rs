//! Signal publishing.
//!
//! `SignalSink` is the seam the ingestion supervisor publishes through.
//! `KafkaSignalPublisher` is the production sink; `MockSignalSink` records
//! what would have been written.

use copytrade_core::{BoxFuture, Signal};
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{BusError, BusResult};
use crate::proto::{decode_signal, v1, SignalRecord};

/// Destination for normalized signals. Safe for concurrent use.
pub trait SignalSink: Send + Sync {
    /// Publish one signal. Callers bound the call with their own timeout.
    fn publish<'a>(&'a self, signal: &'a Signal) -> BoxFuture<'a, BusResult<()>>;

    /// Flush anything still buffered. Blocking.
    fn close(&self, _timeout: Duration) -> BusResult<()> {
        Ok(())
    }
}

/// Arc wrapper for SignalSink trait objects.
pub type DynSignalSink = Arc<dyn SignalSink>;

/// Kafka producer settings.
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub brokers: Vec<String>,
    pub topic: String,
    pub client_id: String,
    /// Upper bound librdkafka spends delivering one message, retries included.
    pub message_timeout: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["localhost:9092".to_string()],
            topic: "influencer_signals".to_string(),
            client_id: "copytrade-ingestion".to_string(),
            message_timeout: Duration::from_secs(30),
        }
    }
}

/// Publishes `bus.v1.Signal` messages keyed by influencer id.
///
/// Writes wait for acknowledgement from all in-sync replicas. The key is
/// hashed with murmur2 (the Java client's default), so one influencer maps to
/// one partition.
pub struct KafkaSignalPublisher {
    producer: FutureProducer,
    topic: String,
}

impl KafkaSignalPublisher {
    pub fn new(config: &PublisherConfig) -> BusResult<Self> {
        if config.brokers.is_empty() {
            return Err(BusError::Config("no Kafka brokers configured".to_string()));
        }
        if config.topic.is_empty() {
            return Err(BusError::Config("empty Kafka topic".to_string()));
        }

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", config.brokers.join(","))
            .set("client.id", &config.client_id)
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .set("partitioner", "murmur2_random")
            .set(
                "message.timeout.ms",
                config.message_timeout.as_millis().to_string(),
            )
            .create()?;

        info!(
            brokers = %config.brokers.join(","),
            topic = %config.topic,
            "Kafka signal publisher created"
        );

        Ok(Self {
            producer,
            topic: config.topic.clone(),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl SignalSink for KafkaSignalPublisher {
    fn publish<'a>(&'a self, signal: &'a Signal) -> BoxFuture<'a, BusResult<()>> {
        Box::pin(async move {
            let record = SignalRecord::encode(signal);
            let message = FutureRecord::to(&self.topic)
                .key(&record.key)
                .payload(&record.value);

            match self.producer.send(message, Timeout::Never).await {
                Ok((partition, offset)) => {
                    debug!(
                        signal_id = %signal.signal_id,
                        influencer_id = %signal.influencer_id,
                        partition,
                        offset,
                        "Signal delivered"
                    );
                    Ok(())
                }
                Err((e, _message)) => Err(BusError::Kafka(e)),
            }
        })
    }

    fn close(&self, timeout: Duration) -> BusResult<()> {
        self.producer.flush(Timeout::After(timeout))?;
        Ok(())
    }
}

/// In-memory sink for tests.
#[derive(Debug, Default)]
pub struct MockSignalSink {
    records: parking_lot::Mutex<Vec<SignalRecord>>,
    failure: parking_lot::Mutex<Option<String>>,
    latency: parking_lot::Mutex<Option<Duration>>,
    closed: AtomicBool,
}

impl MockSignalSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every publish fail with `reason` until cleared with `None`.
    pub fn set_failure(&self, reason: Option<&str>) {
        *self.failure.lock() = reason.map(str::to_string);
    }

    /// Delay every publish by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    pub fn records(&self) -> Vec<SignalRecord> {
        self.records.lock().clone()
    }

    /// Decoded values of every recorded message, in publish order.
    pub fn signals(&self) -> Vec<v1::Signal> {
        self.records
            .lock()
            .iter()
            .filter_map(|r| decode_signal(&r.value).ok())
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Poll until at least `count` records exist or `within` elapses.
    pub async fn wait_for_records(&self, count: usize, within: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + within;
        loop {
            if self.records.lock().len() >= count {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl SignalSink for MockSignalSink {
    fn publish<'a>(&'a self, signal: &'a Signal) -> BoxFuture<'a, BusResult<()>> {
        Box::pin(async move {
            let latency = *self.latency.lock();
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }
            let failure = self.failure.lock().clone();
            if let Some(reason) = failure {
                return Err(BusError::Publish(reason));
            }
            self.records.lock().push(SignalRecord::encode(signal));
            Ok(())
        })
    }

    fn close(&self, _timeout: Duration) -> BusResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
