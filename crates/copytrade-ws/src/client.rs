//! Account fill stream client.
//!
//! Each call to `subscribe_account_events` owns one WebSocket session for one
//! influencer: connect, subscribe to `userFills`, deliver fills until the
//! session fails or the caller cancels. Reconnection is the caller's job.

use chrono::Utc;
use copytrade_core::{BoxFuture, Influencer};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async_tls_with_config, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{HandlerError, WsError, WsResult};
use crate::handler::FillHandler;
use crate::heartbeat::Heartbeat;
use crate::message::{user_fills_subscription, UserFillsPayload, WsMessage, WsRequest};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWrite = SplitSink<WsStream, Message>;
type WsRead = SplitStream<WsStream>;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Stream client configuration.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// WebSocket URL.
    pub url: String,
    /// Quiet period before an application-level ping is sent.
    pub heartbeat_interval: Duration,
    /// Forward the initial snapshot batch sent after subscribing.
    pub include_snapshots: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: "wss://api.hyperliquid.xyz/ws".to_string(),
            heartbeat_interval: Duration::from_secs(30),
            include_snapshots: false,
        }
    }
}

/// Source of account fill events.
pub trait AccountStream: Send + Sync {
    /// Run one session for `influencer`, invoking `handler` for every fill.
    ///
    /// Returns `WsError::Cancelled` when `cancel` fires; any other error
    /// means the session failed and may be retried.
    fn subscribe_account_events<'a>(
        &'a self,
        influencer: &'a Influencer,
        handler: &'a dyn FillHandler,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, WsResult<()>>;
}

pub type DynAccountStream = Arc<dyn AccountStream>;

/// Hyperliquid `userFills` client over tokio-tungstenite.
#[derive(Debug, Clone)]
pub struct UserFillsClient {
    config: StreamConfig,
}

impl UserFillsClient {
    pub fn new(config: StreamConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    async fn run_session(
        &self,
        influencer: &Influencer,
        handler: &dyn FillHandler,
        cancel: &CancellationToken,
    ) -> WsResult<()> {
        if cancel.is_cancelled() {
            return Err(WsError::Cancelled);
        }

        info!(
            influencer_id = %influencer.id,
            address = %influencer.address,
            url = %self.config.url,
            "Connecting to user fills stream"
        );

        let connect = connect_async_tls_with_config(self.config.url.as_str(), None, true, None);
        let (ws_stream, _response) = tokio::select! {
            result = connect => result.map_err(|e| WsError::ConnectionFailed(e.to_string()))?,
            () = cancel.cancelled() => return Err(WsError::Cancelled),
        };
        let (mut write, mut read) = ws_stream.split();

        let result = self
            .stream_fills(&mut write, &mut read, influencer, handler, cancel)
            .await;

        close_socket(&mut write, influencer).await;
        result
    }

    async fn stream_fills(
        &self,
        write: &mut WsWrite,
        read: &mut WsRead,
        influencer: &Influencer,
        handler: &dyn FillHandler,
        cancel: &CancellationToken,
    ) -> WsResult<()> {
        let request = serde_json::to_string(&user_fills_subscription(&influencer.address))?;
        write
            .send(Message::Text(request))
            .await
            .map_err(|e| WsError::SubscriptionFailed(e.to_string()))?;
        handler.on_subscribed();
        debug!(influencer_id = %influencer.id, "userFills subscription sent");

        let mut heartbeat = Heartbeat::new(self.config.heartbeat_interval);
        let check_every = (heartbeat.interval() / 2).max(Duration::from_millis(10));
        let mut ticker =
            tokio::time::interval_at(tokio::time::Instant::now() + check_every, check_every);

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    debug!(influencer_id = %influencer.id, "Cancellation received in message loop");
                    return Err(WsError::Cancelled);
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            heartbeat.record_message();
                            self.handle_text(&text, &mut heartbeat, influencer, handler).await?;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            heartbeat.record_message();
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            heartbeat.record_pong();
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            warn!(influencer_id = %influencer.id, code, %reason, "WebSocket closed by server");
                            return Err(WsError::ConnectionClosed { code, reason });
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.into()),
                        None => {
                            return Err(WsError::ConnectionClosed {
                                code: 1006,
                                reason: "stream ended".to_string(),
                            });
                        }
                    }
                }

                _ = ticker.tick() => {
                    if heartbeat.is_timed_out() {
                        return Err(WsError::HeartbeatTimeout);
                    }
                    if heartbeat.should_send_ping() {
                        let ping = serde_json::to_string(&WsRequest::ping())?;
                        write.send(Message::Text(ping)).await?;
                        heartbeat.record_ping();
                        debug!(influencer_id = %influencer.id, "Sent heartbeat ping");
                    }
                }
            }
        }
    }

    async fn handle_text(
        &self,
        text: &str,
        heartbeat: &mut Heartbeat,
        influencer: &Influencer,
        handler: &dyn FillHandler,
    ) -> WsResult<()> {
        let msg: WsMessage =
            serde_json::from_str(text).map_err(|e| WsError::Parse(format!("{e}: {text}")))?;

        if msg.is_pong() {
            heartbeat.record_pong();
            return Ok(());
        }

        if let Some(parsed) = msg.as_user_fills() {
            let payload =
                parsed.map_err(|e| WsError::Parse(format!("userFills payload: {e}")))?;
            return self.dispatch_batch(payload, influencer, handler).await;
        }

        let WsMessage::Channel(channel_msg) = msg else {
            return Ok(());
        };

        match channel_msg.channel.as_str() {
            "subscriptionResponse" => {
                info!(
                    influencer_id = %influencer.id,
                    address = %influencer.address,
                    "Subscribed to user fills"
                );
                Ok(())
            }
            "error" => Err(WsError::SubscriptionFailed(channel_msg.data.to_string())),
            other => {
                debug!(influencer_id = %influencer.id, channel = other, "Ignoring channel message");
                Ok(())
            }
        }
    }

    async fn dispatch_batch(
        &self,
        payload: UserFillsPayload,
        influencer: &Influencer,
        handler: &dyn FillHandler,
    ) -> WsResult<()> {
        if !payload.user.is_empty() && !payload.user.eq_ignore_ascii_case(&influencer.address) {
            debug!(
                influencer_id = %influencer.id,
                user = %payload.user,
                "Ignoring fills for another user"
            );
            return Ok(());
        }
        if payload.is_snapshot && !self.config.include_snapshots {
            debug!(
                influencer_id = %influencer.id,
                count = payload.fills.len(),
                "Skipping snapshot batch"
            );
            return Ok(());
        }
        if payload.fills.is_empty() {
            return Ok(());
        }

        let received_at = Utc::now();
        for fill in payload.fills {
            match handler.on_fill(fill, received_at).await {
                Ok(()) => {}
                Err(HandlerError::Cancelled) => return Err(WsError::Cancelled),
                Err(e) => {
                    warn!(influencer_id = %influencer.id, error = %e, "Fill handler error");
                }
            }
        }
        Ok(())
    }
}

impl AccountStream for UserFillsClient {
    fn subscribe_account_events<'a>(
        &'a self,
        influencer: &'a Influencer,
        handler: &'a dyn FillHandler,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, WsResult<()>> {
        Box::pin(self.run_session(influencer, handler, cancel))
    }
}

/// Send a Close frame and flush, bounded so a dead peer cannot stall shutdown.
async fn close_socket(write: &mut WsWrite, influencer: &Influencer) {
    match tokio::time::timeout(CLOSE_TIMEOUT, write.close()).await {
        Ok(Ok(())) => debug!(influencer_id = %influencer.id, "WebSocket closed"),
        Ok(Err(e)) => debug!(influencer_id = %influencer.id, error = %e, "WebSocket close failed"),
        Err(_) => debug!(influencer_id = %influencer.id, "WebSocket close timed out"),
    }
}
