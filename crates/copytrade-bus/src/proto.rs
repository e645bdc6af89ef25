//! `bus.v1` protobuf messages.
//!
//! Declared with prost derives so no code generation step is needed. Keep in
//! sync with `proto/bus/v1/signal.proto`.

use copytrade_core::{Signal, SignalAction, SignalSide};
use prost::Message;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::BusResult;

pub mod v1 {
    use std::collections::BTreeMap;

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Signal {
        #[prost(string, tag = "1")]
        pub signal_id: String,
        #[prost(string, tag = "2")]
        pub influencer_id: String,
        #[prost(string, tag = "3")]
        pub exchange: String,
        #[prost(string, tag = "4")]
        pub market: String,
        #[prost(enumeration = "SignalAction", tag = "5")]
        pub action: i32,
        #[prost(enumeration = "SignalSide", tag = "6")]
        pub side: i32,
        #[prost(double, tag = "7")]
        pub size: f64,
        #[prost(double, tag = "8")]
        pub delta_size: f64,
        #[prost(double, tag = "9")]
        pub price: f64,
        #[prost(int64, tag = "10")]
        pub timestamp_ms: i64,
        #[prost(string, tag = "11")]
        pub source_event_id: String,
        /// Encoded in key order, so equal signals encode to equal bytes.
        #[prost(btree_map = "string, string", tag = "12")]
        pub metadata: BTreeMap<String, String>,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum SignalAction {
        Unspecified = 0,
        Open = 1,
        Increase = 2,
        Decrease = 3,
        Close = 4,
        Flip = 5,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum SignalSide {
        Unspecified = 0,
        Long = 1,
        Short = 2,
        Flat = 3,
    }
}

impl From<SignalAction> for v1::SignalAction {
    fn from(action: SignalAction) -> Self {
        match action {
            SignalAction::Open => Self::Open,
            SignalAction::Increase => Self::Increase,
            SignalAction::Decrease => Self::Decrease,
            SignalAction::Close => Self::Close,
            SignalAction::Flip => Self::Flip,
        }
    }
}

impl From<SignalSide> for v1::SignalSide {
    fn from(side: SignalSide) -> Self {
        match side {
            SignalSide::Unspecified => Self::Unspecified,
            SignalSide::Long => Self::Long,
            SignalSide::Short => Self::Short,
            SignalSide::Flat => Self::Flat,
        }
    }
}

impl From<&Signal> for v1::Signal {
    fn from(signal: &Signal) -> Self {
        Self {
            signal_id: signal.signal_id.clone(),
            influencer_id: signal.influencer_id.clone(),
            exchange: signal.exchange.clone(),
            market: signal.market.clone(),
            action: v1::SignalAction::from(signal.action) as i32,
            side: v1::SignalSide::from(signal.side) as i32,
            size: to_f64(signal.size),
            delta_size: to_f64(signal.delta_size),
            price: to_f64(signal.price),
            timestamp_ms: signal.timestamp_ms,
            source_event_id: signal.source_event_id.clone(),
            metadata: signal.metadata.clone(),
        }
    }
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

/// A Kafka message ready to write: key is the influencer id as UTF-8 bytes,
/// value is the encoded `bus.v1.Signal`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalRecord {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl SignalRecord {
    pub fn encode(signal: &Signal) -> Self {
        Self {
            key: signal.influencer_id.as_bytes().to_vec(),
            value: v1::Signal::from(signal).encode_to_vec(),
        }
    }
}

/// Decode a `bus.v1.Signal` message value.
pub fn decode_signal(bytes: &[u8]) -> BusResult<v1::Signal> {
    Ok(v1::Signal::decode(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    fn sample() -> Signal {
        let mut metadata = BTreeMap::new();
        metadata.insert("source_event_id".to_string(), "0xdead".to_string());
        metadata.insert("event_type".to_string(), "fill".to_string());
        Signal {
            signal_id: "abc".to_string(),
            influencer_id: "i1".to_string(),
            exchange: "hyperliquid".to_string(),
            market: "BTC".to_string(),
            action: SignalAction::Flip,
            side: SignalSide::Short,
            size: dec!(7),
            delta_size: dec!(-10),
            price: dec!(40000.5),
            timestamp_ms: 1_700_000_000_000,
            source_event_id: "0xdead".to_string(),
            metadata,
        }
    }

    #[test]
    fn test_record_key_is_influencer_id() {
        let record = SignalRecord::encode(&sample());
        assert_eq!(record.key, b"i1".to_vec());
    }

    #[test]
    fn test_encoded_value_decodes() {
        let record = SignalRecord::encode(&sample());
        let decoded = decode_signal(&record.value).unwrap();

        assert_eq!(decoded.signal_id, "abc");
        assert_eq!(decoded.market, "BTC");
        assert_eq!(decoded.action(), v1::SignalAction::Flip);
        assert_eq!(decoded.side(), v1::SignalSide::Short);
        assert_eq!(decoded.size, 7.0);
        assert_eq!(decoded.delta_size, -10.0);
        assert_eq!(decoded.price, 40000.5);
        assert_eq!(decoded.timestamp_ms, 1_700_000_000_000);
        assert_eq!(decoded.metadata.get("event_type").map(String::as_str), Some("fill"));
    }

    #[test]
    fn test_encoding_is_byte_stable() {
        let a = SignalRecord::encode(&sample());
        let b = SignalRecord::encode(&sample().clone());
        assert_eq!(a, b);
    }

    #[test]
    fn test_enum_wire_values() {
        assert_eq!(v1::SignalAction::from(SignalAction::Open) as i32, 1);
        assert_eq!(v1::SignalAction::from(SignalAction::Flip) as i32, 5);
        assert_eq!(v1::SignalSide::from(SignalSide::Flat) as i32, 3);
        assert_eq!(v1::SignalSide::from(SignalSide::Unspecified) as i32, 0);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_signal(&[0xff, 0xff, 0xff]).is_err());
    }
}
