//! Tracked influencer accounts.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{CoreError, Result};

/// A monitored exchange account whose fills become signals.
///
/// The serialized form uses the registry's key casing
/// (`{"ID","Address","Markets","Priority"}`); lower-case keys are accepted
/// on input.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Influencer {
    /// Stable identity; the partition key of every emitted signal.
    #[serde(rename = "ID", alias = "id", default)]
    pub id: String,
    /// Exchange account address used for the fills subscription.
    #[serde(rename = "Address", alias = "address", default)]
    pub address: String,
    /// Market allow-list. Empty means every market.
    #[serde(
        rename = "Markets",
        alias = "markets",
        default,
        deserialize_with = "null_as_empty"
    )]
    pub markets: Vec<String>,
    #[serde(rename = "Priority", alias = "priority", default)]
    pub priority: i64,
}

impl Influencer {
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            markets: Vec::new(),
            priority: 0,
        }
    }

    pub fn with_markets<I, S>(mut self, markets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.markets = markets.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    /// Canonical form: trimmed id and address, id defaulting to the
    /// address, markets upper-cased and de-duplicated in first-seen order.
    pub fn normalized(mut self) -> Self {
        self.address = self.address.trim().to_string();
        self.id = self.id.trim().to_string();
        if self.id.is_empty() {
            self.id = self.address.clone();
        }

        let mut markets: Vec<String> = Vec::with_capacity(self.markets.len());
        for market in self.markets.drain(..) {
            let market = market.trim().to_uppercase();
            if !market.is_empty() && !markets.contains(&market) {
                markets.push(market);
            }
        }
        self.markets = markets;
        self
    }

    /// Reject influencers that cannot be subscribed.
    pub fn validate(&self) -> Result<()> {
        if self.address.trim().is_empty() {
            return Err(CoreError::InvalidInfluencer("empty address".to_string()));
        }
        if self.id.trim().is_empty() {
            return Err(CoreError::InvalidInfluencer("empty id".to_string()));
        }
        Ok(())
    }

    /// Whether a signal for `market` passes this influencer's filter.
    pub fn accepts_market(&self, market: &str) -> bool {
        self.markets.is_empty() || self.markets.iter().any(|m| m.eq_ignore_ascii_case(market))
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_registry_key_casing() {
        let inf: Influencer = serde_json::from_value(json!({
            "ID": "i1",
            "Address": "0xabc",
            "Markets": ["eth", "BTC"],
            "Priority": 3
        }))
        .unwrap();

        assert_eq!(inf.id, "i1");
        assert_eq!(inf.address, "0xabc");
        assert_eq!(inf.markets, vec!["eth", "BTC"]);
        assert_eq!(inf.priority, 3);
    }

    #[test]
    fn test_lowercase_keys_and_null_markets() {
        let inf: Influencer =
            serde_json::from_value(json!({"id": "i2", "address": "0xdef", "Markets": null}))
                .unwrap();
        assert_eq!(inf.id, "i2");
        assert!(inf.markets.is_empty());
        assert_eq!(inf.priority, 0);
    }

    #[test]
    fn test_serializes_registry_shape() {
        let inf = Influencer::new("i1", "0xabc").with_markets(["ETH"]);
        let value = serde_json::to_value(&inf).unwrap();
        assert_eq!(
            value,
            json!({"ID": "i1", "Address": "0xabc", "Markets": ["ETH"], "Priority": 0})
        );
    }

    #[test]
    fn test_normalized() {
        let inf = Influencer::new("", " 0xabc ")
            .with_markets(["eth", "ETH", " btc", ""])
            .normalized();
        assert_eq!(inf.id, "0xabc");
        assert_eq!(inf.address, "0xabc");
        assert_eq!(inf.markets, vec!["ETH", "BTC"]);
    }

    #[test]
    fn test_validate() {
        assert!(Influencer::new("i1", "0xabc").validate().is_ok());
        assert!(Influencer::new("i1", "  ").validate().is_err());
        assert!(Influencer::new("", "0xabc").validate().is_err());
    }

    #[test]
    fn test_accepts_market() {
        let open = Influencer::new("i1", "0xabc");
        assert!(open.accepts_market("DOGE"));

        let filtered = Influencer::new("i1", "0xabc").with_markets(["ETH"]);
        assert!(filtered.accepts_market("ETH"));
        assert!(filtered.accepts_market("eth"));
        assert!(!filtered.accepts_market("BTC"));
    }
}
