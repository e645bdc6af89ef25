//! Heartbeat tracking for a single WebSocket session.
//!
//! Hyperliquid drops connections that stay silent for too long, so the
//! client sends an application-level ping after one quiet interval. If a
//! further interval passes without any inbound traffic the session is
//! considered dead.

use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Per-session heartbeat state.
#[derive(Debug)]
pub struct Heartbeat {
    interval: Duration,
    last_message: Instant,
    last_ping: Option<Instant>,
    waiting_for_pong: bool,
}

impl Heartbeat {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_message: Instant::now(),
            last_ping: None,
            waiting_for_pong: false,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Any inbound frame proves the connection is alive.
    pub fn record_message(&mut self) {
        self.last_message = Instant::now();
        self.waiting_for_pong = false;
    }

    pub fn record_ping(&mut self) {
        self.last_ping = Some(Instant::now());
        self.waiting_for_pong = true;
    }

    pub fn record_pong(&mut self) {
        if let Some(ping_at) = self.last_ping {
            debug!(rtt_ms = ping_at.elapsed().as_millis() as u64, "Received pong");
        }
        self.record_message();
    }

    /// A ping is outstanding and nothing arrived for a full interval since.
    pub fn is_timed_out(&self) -> bool {
        match (self.waiting_for_pong, self.last_ping) {
            (true, Some(ping_at)) => ping_at.elapsed() >= self.interval,
            _ => false,
        }
    }

    /// The connection has been quiet for an interval and no ping is pending.
    pub fn should_send_ping(&self) -> bool {
        !self.waiting_for_pong && self.last_message.elapsed() >= self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_initial_state() {
        let hb = Heartbeat::new(Duration::from_secs(30));
        assert!(!hb.is_timed_out());
        assert!(!hb.should_send_ping());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ping_after_quiet_interval() {
        let mut hb = Heartbeat::new(Duration::from_secs(30));
        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(hb.should_send_ping());

        hb.record_ping();
        assert!(!hb.should_send_ping());
        assert!(!hb.is_timed_out());

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(hb.is_timed_out());
    }

    #[tokio::test(start_paused = true)]
    async fn test_traffic_clears_pending_ping() {
        let mut hb = Heartbeat::new(Duration::from_secs(30));
        tokio::time::advance(Duration::from_secs(31)).await;
        hb.record_ping();
        tokio::time::advance(Duration::from_secs(5)).await;
        hb.record_pong();

        tokio::time::advance(Duration::from_secs(40)).await;
        assert!(!hb.is_timed_out());
        assert!(hb.should_send_ping());
    }
}
