//! Fill normalization.
//!
//! `normalize_fill` is pure: the same influencer and fill always produce the
//! same signal, except that a fill without a timestamp borrows `received_at`.

use chrono::{DateTime, Utc};
use copytrade_core::numeric::parse_decimal_or_zero;
use copytrade_core::{
    Influencer, PositionDirection, Signal, SignalAction, SignalSide, EXCHANGE_HYPERLIQUID,
    META_EVENT_TYPE, META_INFLUENCER_ADDRESS, META_RAW, META_SOURCE_EVENT_ID,
};
use copytrade_ws::FillPayload;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::trace;

use crate::error::{FeedError, FeedResult};

/// Convert one fill into a signal for `influencer`.
///
/// Fails only when the influencer has no id or the fill has no coin.
/// Unparseable `px`, `sz` or `startPosition` read as zero.
pub fn normalize_fill(
    influencer: &Influencer,
    fill: &FillPayload,
    received_at: Option<DateTime<Utc>>,
) -> FeedResult<Signal> {
    if influencer.id.is_empty() {
        return Err(FeedError::MissingInfluencerId);
    }
    if fill.coin.is_empty() {
        return Err(FeedError::MissingMarket(influencer.id.clone()));
    }
    let market = fill.coin.to_uppercase();

    let price = parse_decimal_or_zero(&fill.px);
    let start_position = parse_decimal_or_zero(&fill.start_position);
    let trade_size = parse_decimal_or_zero(&fill.sz);
    let timestamp_ms = resolve_timestamp(fill.time, received_at);

    let new_position = if fill.is_buy() {
        start_position + trade_size
    } else {
        start_position - trade_size
    };
    let size = new_position.abs();
    let delta_size = new_position - start_position;
    let action = derive_action(
        PositionDirection::of(start_position),
        PositionDirection::of(new_position),
        size,
        delta_size,
    );

    let source_event_id = source_event_id(fill, &market, timestamp_ms);
    let signal_id = signal_id(&influencer.id, &market, &source_event_id);

    let mut metadata = BTreeMap::new();
    metadata.insert(META_EVENT_TYPE.to_string(), "fill".to_string());
    metadata.insert(META_SOURCE_EVENT_ID.to_string(), source_event_id.clone());
    if !influencer.address.is_empty() {
        metadata.insert(META_INFLUENCER_ADDRESS.to_string(), influencer.address.clone());
    }
    match serde_json::to_string(fill) {
        Ok(raw) => {
            metadata.insert(META_RAW.to_string(), raw);
        }
        Err(e) => trace!(error = %e, "Omitting raw fill from metadata"),
    }

    Ok(Signal {
        signal_id,
        influencer_id: influencer.id.clone(),
        exchange: EXCHANGE_HYPERLIQUID.to_string(),
        market,
        action,
        side: SignalSide::from_position(new_position),
        size,
        delta_size,
        price,
        timestamp_ms,
        source_event_id,
        metadata,
    })
}

/// Classify a position change. First matching rule wins:
///
/// 1. LONG to SHORT or SHORT to LONG is `Flip`.
/// 2. Reaching zero size with a negative delta is `Close`.
/// 3. A positive delta is `Open` when the whole position is new, else `Increase`.
/// 4. A negative delta is `Close` at zero size, else `Decrease`.
/// 5. Anything else (no change) is `Open`.
///
/// `None` means flat. `delta_size` is the signed `new - start`, so the
/// verbs follow the position number rather than exposure.
pub fn derive_action(
    prev: Option<PositionDirection>,
    new: Option<PositionDirection>,
    size: Decimal,
    delta_size: Decimal,
) -> SignalAction {
    if let (Some(prev_dir), Some(new_dir)) = (prev, new) {
        if prev_dir != new_dir {
            return SignalAction::Flip;
        }
    }

    if size.is_zero() && delta_size < Decimal::ZERO {
        return SignalAction::Close;
    }
    if delta_size > Decimal::ZERO {
        if size == delta_size || prev.is_none() {
            SignalAction::Open
        } else {
            SignalAction::Increase
        }
    } else if delta_size < Decimal::ZERO {
        if size.is_zero() {
            SignalAction::Close
        } else {
            SignalAction::Decrease
        }
    } else {
        SignalAction::Open
    }
}

/// First available of: hash, `tid:<n>`, `oid:<n>`, `fill:<market>:<timestamp_ms>`.
pub fn source_event_id(fill: &FillPayload, market: &str, timestamp_ms: i64) -> String {
    if let Some(hash) = fill.hash() {
        hash.to_string()
    } else if fill.tid != 0 {
        format!("tid:{}", fill.tid)
    } else if fill.oid != 0 {
        format!("oid:{}", fill.oid)
    } else {
        format!("fill:{market}:{timestamp_ms}")
    }
}

/// Lower-case hex SHA-256 of `influencer_id|market|source_event_id`.
pub fn signal_id(influencer_id: &str, market: &str, source_event_id: &str) -> String {
    let digest = Sha256::digest(format!("{influencer_id}|{market}|{source_event_id}").as_bytes());
    hex::encode(digest)
}

fn resolve_timestamp(fill_time: u64, received_at: Option<DateTime<Utc>>) -> i64 {
    match i64::try_from(fill_time) {
        Ok(t) if t != 0 => t,
        _ => received_at.map(|t| t.timestamp_millis()).unwrap_or(0),
    }
}
