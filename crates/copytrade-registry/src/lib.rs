//! Influencer registry.
//!
//! The tracked influencer set lives in a Redis SET whose members are JSON
//! blobs. The ingester reads it once at startup; operator tooling adds to it.

pub mod error;
pub mod store;

pub use error::{RegistryError, RegistryResult};
pub use store::{
    connection_info, parse_members, DynInfluencerSource, InfluencerSource,
    RedisInfluencerRegistry, RegistryConfig, StaticInfluencerSource,
};
