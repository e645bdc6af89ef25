//! Mock Hyperliquid WebSocket server for integration tests.
//!
//! Each accepted connection plays the next scripted session:
//! - acknowledge the `userFills` subscribe with `subscriptionResponse`
//! - push the session's frames in order
//! - either close the socket or hold it open until the client closes

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

/// Frames pushed on one connection after the subscription ack.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub frames: Vec<Value>,
    /// Close the socket after the last frame.
    pub close_after: bool,
}

impl Session {
    pub fn hold(frames: Vec<Value>) -> Self {
        Self {
            frames,
            close_after: false,
        }
    }

    pub fn close(frames: Vec<Value>) -> Self {
        Self {
            frames,
            close_after: true,
        }
    }
}

#[derive(Default)]
struct Recorded {
    connections: AtomicUsize,
    client_closes: AtomicUsize,
    subscriptions: Mutex<Vec<Value>>,
}

/// A mock Hyperliquid `userFills` server.
pub struct MockHyperliquid {
    addr: SocketAddr,
    recorded: Arc<Recorded>,
    shutdown: CancellationToken,
}

impl MockHyperliquid {
    /// Start on an available port. Connections beyond the script get an
    /// empty session that holds.
    pub async fn start(sessions: Vec<Session>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let recorded = Arc::new(Recorded::default());
        let shutdown = CancellationToken::new();

        let script = Arc::new(Mutex::new(VecDeque::from(sessions)));
        let rec = recorded.clone();
        let stop = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    accepted = listener.accept() => {
                        let Ok((stream, _)) = accepted else { break };
                        rec.connections.fetch_add(1, Ordering::SeqCst);
                        let session = script.lock().pop_front().unwrap_or_default();
                        tokio::spawn(handle_connection(stream, session, rec.clone()));
                    }
                    () = stop.cancelled() => break,
                }
            }
        });

        Self {
            addr,
            recorded,
            shutdown,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn connection_count(&self) -> usize {
        self.recorded.connections.load(Ordering::SeqCst)
    }

    pub fn client_close_count(&self) -> usize {
        self.recorded.client_closes.load(Ordering::SeqCst)
    }

    pub fn subscriptions(&self) -> Vec<Value> {
        self.recorded.subscriptions.lock().clone()
    }

    /// Poll until `check` holds or `within` elapses.
    pub async fn wait_until(&self, within: Duration, check: impl Fn(&Self) -> bool) -> bool {
        let deadline = tokio::time::Instant::now() + within;
        while tokio::time::Instant::now() < deadline {
            if check(self) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        check(self)
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

async fn handle_connection(stream: TcpStream, session: Session, recorded: Arc<Recorded>) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("WebSocket handshake failed: {e}");
            return;
        }
    };
    let (mut write, mut read) = ws_stream.split();

    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let Ok(parsed) = serde_json::from_str::<Value>(&text) else {
                    continue;
                };
                match parsed.get("method").and_then(Value::as_str) {
                    Some("subscribe") => {
                        recorded.subscriptions.lock().push(parsed.clone());
                        let ack = json!({"channel": "subscriptionResponse", "data": parsed});
                        if write.send(Message::Text(ack.to_string())).await.is_err() {
                            return;
                        }
                        for frame in &session.frames {
                            if write.send(Message::Text(frame.to_string())).await.is_err() {
                                return;
                            }
                        }
                        if session.close_after {
                            let _ = write.send(Message::Close(None)).await;
                            return;
                        }
                    }
                    Some("ping") => {
                        let pong = json!({"channel": "pong"});
                        let _ = write.send(Message::Text(pong.to_string())).await;
                    }
                    _ => {}
                }
            }
            Ok(Message::Close(_)) => {
                recorded.client_closes.fetch_add(1, Ordering::SeqCst);
                break;
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }
}

/// A `userFills` channel frame.
pub fn user_fills(user: &str, is_snapshot: bool, fills: Vec<Value>) -> Value {
    json!({
        "channel": "userFills",
        "data": {"isSnapshot": is_snapshot, "user": user, "fills": fills}
    })
}

/// A fill as the exchange sends it.
pub fn fill(coin: &str, side: &str, sz: &str, start_position: &str, hash: &str) -> Value {
    json!({
        "coin": coin,
        "px": "3000",
        "sz": sz,
        "side": side,
        "time": 1_700_000_000_000_u64,
        "startPosition": start_position,
        "dir": "Open Long",
        "closedPnl": "0.0",
        "hash": hash,
        "oid": 90542681_u64,
        "crossed": true,
        "fee": "0.1",
        "tid": 118906512037719_u64,
        "feeToken": "USDC"
    })
}
