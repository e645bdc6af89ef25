//! Normalized signal types.
//!
//! A `Signal` describes how an influencer's position changed after one fill,
//! independent of the exchange that reported it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Exchange tag carried by every signal produced from Hyperliquid fills.
pub const EXCHANGE_HYPERLIQUID: &str = "hyperliquid";

pub const META_EVENT_TYPE: &str = "event_type";
pub const META_SOURCE_EVENT_ID: &str = "source_event_id";
pub const META_INFLUENCER_ADDRESS: &str = "influencer_address";
pub const META_RAW: &str = "raw";

/// Semantic verb of a position change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalAction {
    Open,
    Increase,
    Decrease,
    Close,
    Flip,
}

impl SignalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Increase => "INCREASE",
            Self::Decrease => "DECREASE",
            Self::Close => "CLOSE",
            Self::Flip => "FLIP",
        }
    }
}

impl fmt::Display for SignalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Post-trade position side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalSide {
    #[default]
    Unspecified,
    Long,
    Short,
    Flat,
}

impl SignalSide {
    /// Side of a signed position: positive is long, negative short, zero flat.
    pub fn from_position(position: Decimal) -> Self {
        match PositionDirection::of(position) {
            Some(PositionDirection::Long) => Self::Long,
            Some(PositionDirection::Short) => Self::Short,
            None => Self::Flat,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unspecified => "UNSPECIFIED",
            Self::Long => "LONG",
            Self::Short => "SHORT",
            Self::Flat => "FLAT",
        }
    }
}

impl fmt::Display for SignalSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a non-zero position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PositionDirection {
    Long,
    Short,
}

impl PositionDirection {
    /// Direction of a signed position; `None` when flat.
    pub fn of(position: Decimal) -> Option<Self> {
        if position.is_zero() {
            None
        } else if position.is_sign_positive() {
            Some(Self::Long)
        } else {
            Some(Self::Short)
        }
    }
}

/// Normalized position-change event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Hex SHA-256 of `influencer_id|market|source_event_id`.
    pub signal_id: String,
    pub influencer_id: String,
    pub exchange: String,
    /// Upper-cased market symbol.
    pub market: String,
    pub action: SignalAction,
    pub side: SignalSide,
    /// Absolute post-trade position size.
    pub size: Decimal,
    /// Signed change: post-trade position minus pre-trade position.
    pub delta_size: Decimal,
    pub price: Decimal,
    pub timestamp_ms: i64,
    pub source_event_id: String,
    pub metadata: BTreeMap<String, String>,
}

impl Signal {
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}
