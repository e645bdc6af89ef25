//! Fill callback seam between the stream client and its consumer.

use chrono::{DateTime, Utc};
use copytrade_core::BoxFuture;

use crate::error::HandlerError;
use crate::message::FillPayload;

/// Receives fills from one account stream, one at a time, in arrival order.
pub trait FillHandler: Send + Sync {
    /// Handle a single fill. `received_at` is shared by every fill of a batch.
    fn on_fill(
        &self,
        fill: FillPayload,
        received_at: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<(), HandlerError>>;

    /// Called once the subscription request has been written to the socket.
    fn on_subscribed(&self) {}
}
