//! Lenient numeric parsing for exchange payloads.
//!
//! Hyperliquid sends the same field as a decimal string (`"3000.5"`) or as a
//! JSON number literal depending on channel and API revision. The helpers
//! here accept either form. Empty strings are an error, never zero.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::str::FromStr;

use crate::error::{CoreError, Result};

/// Parse a decimal from a JSON string, integer, float, or big-number literal.
pub fn parse_decimal(value: &Value) -> Result<Decimal> {
    match value {
        Value::Number(n) => decimal_from_str(&n.to_string()),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Err(CoreError::EmptyNumber);
            }
            decimal_from_str(trimmed)
        }
        Value::Null => Err(CoreError::MissingNumber),
        other => Err(CoreError::InvalidNumber(other.to_string())),
    }
}

/// Parse a decimal, substituting zero on any error.
///
/// For fields where a bad value must not reject the whole payload.
pub fn parse_decimal_or_zero(value: &Value) -> Decimal {
    parse_decimal(value).unwrap_or(Decimal::ZERO)
}

/// Parse an unsigned integer identifier or timestamp.
pub fn parse_u64(value: &Value) -> Result<u64> {
    match value {
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                return Ok(v);
            }
            match n.as_f64() {
                Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => Ok(f as u64),
                _ => Err(CoreError::InvalidNumber(n.to_string())),
            }
        }
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Err(CoreError::EmptyNumber);
            }
            trimmed
                .parse::<u64>()
                .map_err(|_| CoreError::InvalidNumber(trimmed.to_string()))
        }
        Value::Null => Err(CoreError::MissingNumber),
        other => Err(CoreError::InvalidNumber(other.to_string())),
    }
}

fn decimal_from_str(s: &str) -> Result<Decimal> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .map_err(|_| CoreError::InvalidNumber(s.to_string()))
}

/// Serde helper: accept a `u64` given as a number or a string. `null` reads as 0.
pub fn deserialize_lenient_u64<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(0),
        other => parse_u64(&other).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_parse_decimal_string() {
        assert_eq!(parse_decimal(&json!("3000.5")).unwrap(), dec!(3000.5));
        assert_eq!(parse_decimal(&json!(" -1.25 ")).unwrap(), dec!(-1.25));
    }

    #[test]
    fn test_parse_decimal_literals() {
        assert_eq!(parse_decimal(&json!(42)).unwrap(), dec!(42));
        assert_eq!(parse_decimal(&json!(-7)).unwrap(), dec!(-7));
        assert_eq!(parse_decimal(&json!(0.5)).unwrap(), dec!(0.5));
        assert_eq!(parse_decimal(&json!(u64::MAX)).unwrap(), Decimal::from(u64::MAX));
    }

    #[test]
    fn test_parse_decimal_scientific() {
        assert_eq!(parse_decimal(&json!("1e-3")).unwrap(), dec!(0.001));
        assert_eq!(parse_decimal(&json!(1e-7)).unwrap(), dec!(0.0000001));
    }

    #[test]
    fn test_parse_decimal_empty_is_error() {
        assert!(matches!(parse_decimal(&json!("")), Err(CoreError::EmptyNumber)));
        assert!(matches!(parse_decimal(&json!("   ")), Err(CoreError::EmptyNumber)));
    }

    #[test]
    fn test_parse_decimal_rejects_garbage() {
        assert!(parse_decimal(&json!("abc")).is_err());
        assert!(parse_decimal(&json!(true)).is_err());
        assert!(parse_decimal(&json!({"px": 1})).is_err());
        assert!(matches!(parse_decimal(&Value::Null), Err(CoreError::MissingNumber)));
    }

    #[test]
    fn test_parse_decimal_or_zero() {
        assert_eq!(parse_decimal_or_zero(&json!("")), Decimal::ZERO);
        assert_eq!(parse_decimal_or_zero(&json!("x")), Decimal::ZERO);
        assert_eq!(parse_decimal_or_zero(&json!("2")), dec!(2));
    }

    #[test]
    fn test_parse_u64() {
        assert_eq!(parse_u64(&json!(123)).unwrap(), 123);
        assert_eq!(parse_u64(&json!("456")).unwrap(), 456);
        assert_eq!(parse_u64(&json!(1700000000000.0)).unwrap(), 1_700_000_000_000);
        assert!(parse_u64(&json!(-1)).is_err());
        assert!(parse_u64(&json!(1.5)).is_err());
        assert!(parse_u64(&json!("")).is_err());
    }

    #[derive(Deserialize)]
    struct Holder {
        #[serde(default, deserialize_with = "deserialize_lenient_u64")]
        tid: u64,
    }

    #[test]
    fn test_lenient_u64_field() {
        let h: Holder = serde_json::from_value(json!({"tid": "99"})).unwrap();
        assert_eq!(h.tid, 99);
        let h: Holder = serde_json::from_value(json!({"tid": 7})).unwrap();
        assert_eq!(h.tid, 7);
        let h: Holder = serde_json::from_value(json!({"tid": null})).unwrap();
        assert_eq!(h.tid, 0);
        let h: Holder = serde_json::from_value(json!({})).unwrap();
        assert_eq!(h.tid, 0);
        assert!(serde_json::from_value::<Holder>(json!({"tid": "x"})).is_err());
    }
}
