//! Market data models
//!
//! This module contains the core data types for the feed layer:
//! - `types` - Type aliases for common identifiers (SourceId)
//! - `key` - Canonical lookup key (FeedKey)
//! - `quote` - Fetched value structures (PriceQuote, FeedStatus)
//! - `health` - Per-source health snapshots (HealthRecord, HealthThresholds)

mod health;
mod key;
mod quote;
mod types;

pub use health::{HealthRecord, HealthThresholds};
pub use key::FeedKey;
pub use quote::{FeedStatus, PriceQuote};
pub use types::SourceId;
