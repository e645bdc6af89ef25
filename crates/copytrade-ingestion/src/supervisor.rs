//! Per-influencer stream supervision.
//!
//! One tokio task per influencer runs the account stream in a loop:
//!
//! ```text
//! CONNECTING -> SUBSCRIBED --error--> BACKOFF --delay--> CONNECTING
//!      any state --cancel--> DRAINING -> EXITED
//! ```
//!
//! Fills are handled sequentially inside a task, so per-influencer order is
//! the order the exchange delivered them.

use chrono::{DateTime, Utc};
use copytrade_bus::DynSignalSink;
use copytrade_core::{BoxFuture, Influencer};
use copytrade_feed::normalize_fill;
use copytrade_telemetry::Metrics;
use copytrade_ws::{DynAccountStream, FillHandler, FillPayload, HandlerError};
use dashmap::DashMap;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Lifecycle state of one influencer's stream task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    Connecting,
    Subscribed,
    Backoff,
    Draining,
    Exited,
}

impl TaskState {
    /// Numeric value exported on the `copytrade_stream_state` gauge.
    pub fn as_metric(&self) -> i64 {
        match self {
            Self::Connecting => 0,
            Self::Subscribed => 1,
            Self::Backoff => 2,
            Self::Draining => 3,
            Self::Exited => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "CONNECTING",
            Self::Subscribed => "SUBSCRIBED",
            Self::Backoff => "BACKOFF",
            Self::Draining => "DRAINING",
            Self::Exited => "EXITED",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supervisor timings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorSettings {
    /// Delay between a failed session and the next connect.
    pub backoff: Duration,
    /// Upper bound on one publish.
    pub publish_timeout: Duration,
    /// How long `run` waits for tasks after cancellation before aborting them.
    pub shutdown_grace: Duration,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            backoff: Duration::from_secs(5),
            publish_timeout: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

type StateMap = Arc<DashMap<String, TaskState>>;

fn set_state(states: &StateMap, influencer_id: &str, state: TaskState) {
    states.insert(influencer_id.to_string(), state);
    Metrics::stream_state(influencer_id, state.as_metric());
}

/// Runs and restarts one account stream per influencer.
pub struct StreamSupervisor {
    stream: DynAccountStream,
    sink: DynSignalSink,
    settings: SupervisorSettings,
    states: StateMap,
}

impl StreamSupervisor {
    pub fn new(stream: DynAccountStream, sink: DynSignalSink, settings: SupervisorSettings) -> Self {
        Self {
            stream,
            sink,
            settings,
            states: Arc::new(DashMap::new()),
        }
    }

    /// Shared view of every task's current state, keyed by influencer id.
    pub fn states(&self) -> Arc<DashMap<String, TaskState>> {
        Arc::clone(&self.states)
    }

    pub fn state(&self, influencer_id: &str) -> Option<TaskState> {
        self.states.get(influencer_id).map(|s| *s)
    }

    /// Run until `cancel` fires, then wait for every task to exit.
    ///
    /// Duplicate influencer ids after the first are ignored. Tasks still
    /// running once the grace window elapses are aborted.
    pub async fn run(&self, influencers: Vec<Influencer>, cancel: CancellationToken) {
        let mut tasks = JoinSet::new();
        let mut seen = HashSet::new();

        for influencer in influencers {
            if !seen.insert(influencer.id.clone()) {
                warn!(influencer_id = %influencer.id, "Duplicate influencer id, ignoring");
                continue;
            }
            set_state(&self.states, &influencer.id, TaskState::Connecting);
            tasks.spawn(run_stream_task(
                Arc::clone(&self.stream),
                Arc::clone(&self.sink),
                self.settings,
                Arc::clone(&self.states),
                influencer,
                cancel.child_token(),
            ));
        }

        info!(tasks = tasks.len(), "Stream supervisor started");

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                joined = tasks.join_next() => match joined {
                    Some(result) => log_join(result),
                    None => break,
                },
            }
        }

        if tasks.is_empty() {
            info!("Stream supervisor stopped");
            return;
        }

        info!(
            tasks = tasks.len(),
            grace = ?self.settings.shutdown_grace,
            "Waiting for stream tasks to drain"
        );
        let drain = async {
            while let Some(result) = tasks.join_next().await {
                log_join(result);
            }
        };
        if tokio::time::timeout(self.settings.shutdown_grace, drain).await.is_err() {
            warn!(
                remaining = tasks.len(),
                "Stream tasks did not exit within grace window, aborting"
            );
            tasks.shutdown().await;
        }
        info!("Stream supervisor stopped");
    }
}

fn log_join(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            error!(error = %e, "Stream task panicked");
        } else {
            debug!(error = %e, "Stream task aborted");
        }
    }
}

async fn run_stream_task(
    stream: DynAccountStream,
    sink: DynSignalSink,
    settings: SupervisorSettings,
    states: StateMap,
    influencer: Influencer,
    cancel: CancellationToken,
) {
    Metrics::stream_started();
    let handler = PublishHandler {
        influencer: influencer.clone(),
        sink,
        publish_timeout: settings.publish_timeout,
        states: Arc::clone(&states),
        cancel: cancel.clone(),
    };

    loop {
        if cancel.is_cancelled() {
            break;
        }
        set_state(&states, &influencer.id, TaskState::Connecting);

        match stream
            .subscribe_account_events(&influencer, &handler, &cancel)
            .await
        {
            Err(e) if e.is_cancelled() || cancel.is_cancelled() => break,
            Err(e) => {
                warn!(
                    influencer_id = %influencer.id,
                    error = %e,
                    backoff = ?settings.backoff,
                    "Stream session failed, reconnecting after backoff"
                );
            }
            Ok(()) => {
                info!(
                    influencer_id = %influencer.id,
                    backoff = ?settings.backoff,
                    "Stream session ended, reconnecting after backoff"
                );
            }
        }

        Metrics::stream_reconnect(&influencer.id);
        set_state(&states, &influencer.id, TaskState::Backoff);
        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(settings.backoff) => {}
        }
    }

    set_state(&states, &influencer.id, TaskState::Draining);
    debug!(influencer_id = %influencer.id, "Stream task draining");
    set_state(&states, &influencer.id, TaskState::Exited);
    Metrics::stream_stopped();
}

/// Normalizes, filters and publishes each fill of one influencer.
struct PublishHandler {
    influencer: Influencer,
    sink: DynSignalSink,
    publish_timeout: Duration,
    states: StateMap,
    cancel: CancellationToken,
}

impl PublishHandler {
    async fn handle(&self, fill: FillPayload, received_at: DateTime<Utc>) -> Result<(), HandlerError> {
        let influencer_id = self.influencer.id.as_str();
        Metrics::fill_received(influencer_id);

        let signal = match normalize_fill(&self.influencer, &fill, Some(received_at)) {
            Ok(signal) => signal,
            Err(e) => {
                debug!(influencer_id, error = %e, "Dropping fill that could not be normalized");
                Metrics::normalize_failed(influencer_id);
                return Ok(());
            }
        };

        if !self.influencer.accepts_market(&signal.market) {
            debug!(influencer_id, market = %signal.market, "Market not tracked for influencer");
            Metrics::signal_filtered(influencer_id);
            return Ok(());
        }

        let started = Instant::now();
        tokio::select! {
            biased;

            () = self.cancel.cancelled() => Err(HandlerError::Cancelled),

            result = tokio::time::timeout(self.publish_timeout, self.sink.publish(&signal)) => {
                match result {
                    Ok(Ok(())) => {
                        Metrics::signal_published(
                            influencer_id,
                            signal.action.as_str(),
                            started.elapsed().as_secs_f64(),
                        );
                        debug!(
                            influencer_id,
                            signal_id = %signal.signal_id,
                            market = %signal.market,
                            action = %signal.action,
                            side = %signal.side,
                            "Signal published"
                        );
                        Ok(())
                    }
                    Ok(Err(e)) => {
                        Metrics::publish_failed(influencer_id);
                        Err(HandlerError::Failed(format!(
                            "publish signal {}: {e}",
                            signal.signal_id
                        )))
                    }
                    Err(_) => {
                        Metrics::publish_failed(influencer_id);
                        Err(HandlerError::Failed(format!(
                            "publish signal {} timed out after {:?}",
                            signal.signal_id, self.publish_timeout
                        )))
                    }
                }
            }
        }
    }
}

impl FillHandler for PublishHandler {
    fn on_fill(
        &self,
        fill: FillPayload,
        received_at: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<(), HandlerError>> {
        Box::pin(self.handle(fill, received_at))
    }

    fn on_subscribed(&self) {
        set_state(&self.states, &self.influencer.id, TaskState::Subscribed);
    }
}
