//! WebSocket message types for the Hyperliquid `userFills` channel.

use copytrade_core::numeric::deserialize_lenient_u64;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// User Fills (Incoming)
// ============================================================================

/// One trade execution from the `userFills` channel.
///
/// Numeric fields arrive as strings or literals depending on API revision,
/// so `px`, `sz` and `startPosition` are kept as raw JSON and parsed by the
/// normalizer. Fields not modelled here are retained in `extra` so the fill
/// re-serializes with everything the exchange sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FillPayload {
    /// Coin symbol.
    #[serde(default)]
    pub coin: String,
    /// Side token: "B" for buy, "A" for sell.
    #[serde(default)]
    pub side: String,
    #[serde(default)]
    pub px: Value,
    #[serde(default)]
    pub sz: Value,
    /// Signed position before this fill.
    #[serde(rename = "startPosition", default)]
    pub start_position: Value,
    /// Fill timestamp in milliseconds; 0 when absent.
    #[serde(default, deserialize_with = "deserialize_lenient_u64")]
    pub time: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// Trade ID; 0 when absent.
    #[serde(default, deserialize_with = "deserialize_lenient_u64")]
    pub tid: u64,
    /// Order ID; 0 when absent.
    #[serde(default, deserialize_with = "deserialize_lenient_u64")]
    pub oid: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FillPayload {
    /// Buy iff the trimmed, upper-cased side token is `B` or `BUY`.
    /// Every other token counts as a sell.
    pub fn is_buy(&self) -> bool {
        let token = self.side.trim().to_uppercase();
        token == "B" || token == "BUY"
    }

    /// Transaction hash, if present and non-empty.
    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref().filter(|h| !h.is_empty())
    }
}

/// `userFills` channel data.
/// Format: `{ "isSnapshot"?: bool, "user": string, "fills": [FillPayload, ...] }`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserFillsPayload {
    /// True for the initial snapshot sent right after subscribing.
    #[serde(rename = "isSnapshot", default)]
    pub is_snapshot: bool,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub fills: Vec<FillPayload>,
}

// ============================================================================
// Envelope
// ============================================================================

/// Inbound WebSocket message.
///
/// The `channel` field determines the message type:
/// - "pong": Heartbeat response
/// - "subscriptionResponse": Subscription confirmation
/// - "userFills": Fill batches
/// - "error": Rejected request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WsMessage {
    /// Pong response (no data field, just channel: "pong").
    Pong(PongMessage),
    /// Channel-based message (all other messages with data field).
    Channel(ChannelMessage),
}

impl WsMessage {
    pub fn is_pong(&self) -> bool {
        match self {
            Self::Pong(p) => p.is_pong(),
            Self::Channel(c) => c.channel == "pong",
        }
    }

    /// Parse the `userFills` payload. `None` for other channels.
    pub fn as_user_fills(&self) -> Option<serde_json::Result<UserFillsPayload>> {
        match self {
            Self::Channel(c) if c.channel == "userFills" => {
                Some(serde_json::from_value(c.data.clone()))
            }
            _ => None,
        }
    }
}

/// Channel-based message carrying a data field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub channel: String,
    #[serde(default)]
    pub data: Value,
}

/// Pong response message (Hyperliquid format: {"channel": "pong"}).
/// Uses deny_unknown_fields to distinguish from ChannelMessage in untagged enum.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PongMessage {
    pub channel: String,
}

impl PongMessage {
    pub fn is_pong(&self) -> bool {
        self.channel == "pong"
    }
}

// ============================================================================
// Outbound
// ============================================================================

/// Outgoing request to WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsRequest {
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<Value>,
}

impl WsRequest {
    pub fn ping() -> Self {
        Self {
            method: "ping".to_string(),
            subscription: None,
        }
    }

    pub fn subscribe(subscription: Value) -> Self {
        Self {
            method: "subscribe".to_string(),
            subscription: Some(subscription),
        }
    }
}

/// Subscribe request for the fills of one account.
pub fn user_fills_subscription(user: &str) -> WsRequest {
    WsRequest::subscribe(serde_json::json!({
        "type": "userFills",
        "user": user
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fill_payload_string_numbers() {
        let fill: FillPayload = serde_json::from_value(json!({
            "coin": "BTC",
            "side": "B",
            "px": "50000.5",
            "sz": "0.05",
            "time": 1700000000123_u64,
            "tid": 987654321_u64,
            "fee": "0.25",
            "startPosition": "0.1",
            "dir": "Open Long",
            "hash": "0xdead"
        }))
        .unwrap();

        assert_eq!(fill.coin, "BTC");
        assert_eq!(fill.px, json!("50000.5"));
        assert_eq!(fill.time, 1700000000123);
        assert_eq!(fill.tid, 987654321);
        assert_eq!(fill.oid, 0);
        assert_eq!(fill.hash(), Some("0xdead"));
        assert_eq!(fill.extra.get("dir"), Some(&json!("Open Long")));
        assert!(fill.is_buy());
    }

    #[test]
    fn test_fill_payload_literal_numbers_and_string_ids() {
        let fill: FillPayload = serde_json::from_value(json!({
            "coin": "ETH",
            "side": "A",
            "px": 3000,
            "sz": 1.5,
            "startPosition": -2,
            "time": "1700000000000",
            "oid": "42"
        }))
        .unwrap();

        assert_eq!(fill.sz, json!(1.5));
        assert_eq!(fill.time, 1_700_000_000_000);
        assert_eq!(fill.oid, 42);
        assert_eq!(fill.hash(), None);
        assert!(!fill.is_buy());
    }

    #[test]
    fn test_fill_side_tokens() {
        let side = |s: &str| FillPayload {
            side: s.to_string(),
            ..Default::default()
        };
        assert!(side("B").is_buy());
        assert!(side(" buy ").is_buy());
        assert!(side("b").is_buy());
        assert!(!side("A").is_buy());
        assert!(!side("S").is_buy());
        assert!(!side("Bid").is_buy());
        assert!(!side("").is_buy());
    }

    #[test]
    fn test_fill_reserializes_unknown_fields() {
        let raw = json!({
            "coin": "SOL",
            "side": "A",
            "px": "150",
            "sz": "5",
            "startPosition": "10",
            "time": 1700000000000_u64,
            "tid": 7,
            "oid": 8,
            "crossed": true
        });
        let fill: FillPayload = serde_json::from_value(raw.clone()).unwrap();
        let back = serde_json::to_value(&fill).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn test_empty_hash_is_absent() {
        let fill: FillPayload = serde_json::from_value(json!({"coin": "X", "hash": ""})).unwrap();
        assert_eq!(fill.hash(), None);
    }

    #[test]
    fn test_ws_message_pong() {
        let msg: WsMessage = serde_json::from_value(json!({"channel": "pong"})).unwrap();
        assert!(msg.is_pong());
        assert!(msg.as_user_fills().is_none());
    }

    #[test]
    fn test_ws_message_user_fills() {
        let msg: WsMessage = serde_json::from_value(json!({
            "channel": "userFills",
            "data": {
                "isSnapshot": true,
                "user": "0xabc",
                "fills": [
                    {"coin": "BTC", "side": "B", "px": "1", "sz": "1", "startPosition": "0", "tid": 1},
                    {"coin": "ETH", "side": "A", "px": "2", "sz": "1", "startPosition": "1", "tid": 2}
                ]
            }
        }))
        .unwrap();

        let payload = msg.as_user_fills().unwrap().unwrap();
        assert!(payload.is_snapshot);
        assert_eq!(payload.user, "0xabc");
        assert_eq!(payload.fills.len(), 2);
        assert_eq!(payload.fills[1].coin, "ETH");
    }

    #[test]
    fn test_ws_message_streaming_update_defaults() {
        let msg: WsMessage = serde_json::from_value(json!({
            "channel": "userFills",
            "data": {"user": "0xabc", "fills": []}
        }))
        .unwrap();
        let payload = msg.as_user_fills().unwrap().unwrap();
        assert!(!payload.is_snapshot);
        assert!(payload.fills.is_empty());
    }

    #[test]
    fn test_ws_message_other_channels() {
        let msg: WsMessage = serde_json::from_value(json!({
            "channel": "subscriptionResponse",
            "data": {"method": "subscribe", "subscription": {"type": "userFills", "user": "0xabc"}}
        }))
        .unwrap();
        assert!(!msg.is_pong());
        assert!(msg.as_user_fills().is_none());
    }

    #[test]
    fn test_user_fills_subscription_request() {
        let req = user_fills_subscription("0xabc");
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"method": "subscribe", "subscription": {"type": "userFills", "user": "0xabc"}})
        );
        assert_eq!(
            serde_json::to_string(&WsRequest::ping()).unwrap(),
            r#"{"method":"ping"}"#
        );
    }
}
