//! Fill to signal normalization.
//!
//! Turns one exchange fill into a `Signal`: the post-trade side and size,
//! the semantic action derived from position arithmetic, and a deterministic
//! `signal_id` that downstream consumers dedupe on.

pub mod error;
pub mod normalizer;

pub use error::{FeedError, FeedResult};
pub use normalizer::{derive_action, normalize_fill, signal_id, source_event_id};
