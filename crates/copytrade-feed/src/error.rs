//! Feed error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("missing market (coin) in fill for influencer {0}")]
    MissingMarket(String),

    #[error("missing influencer id")]
    MissingInfluencerId,
}

pub type FeedResult<T> = Result<T, FeedError>;
