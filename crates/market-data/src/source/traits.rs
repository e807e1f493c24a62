//! Quote source trait definition.
//!
//! This module defines the `QuoteSource` capability that all concrete
//! sources implement. The fallback chain depends only on this trait, never
//! on a concrete source.

use async_trait::async_trait;

use crate::errors::FeedError;
use crate::models::{FeedKey, PriceQuote};

/// A named capability that can attempt to fetch a value and either succeed
/// or fail.
///
/// Sources are immutable and shared: the chain holds a reference and never
/// mutates them, and a source must not retain or mutate chain state. From
/// the chain's point of view a source is a pure function of the key.
/// Transport, auth, rate limiting, and timeouts are the source's own
/// business - the chain never inspects them.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use quotewatch_market_data::source::QuoteSource;
///
/// struct MySource;
///
/// #[async_trait]
/// impl QuoteSource for MySource {
///     fn name(&self) -> &'static str {
///         "MY_SOURCE"
///     }
///
///     async fn fetch(&self, key: &FeedKey) -> Result<PriceQuote, FeedError> {
///         // ... call the upstream API
///     }
/// }
/// ```
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Unique identifier for this source.
    ///
    /// Should be a constant string like "COINGECKO" or "DEXSCREENER".
    /// Used for logging, breaker tracking, and health records.
    fn name(&self) -> &'static str;

    /// Fetch the current value for a key.
    ///
    /// Returns a [`PriceQuote`] on success. A source that cannot serve the
    /// given key kind returns [`FeedError::UnsupportedKey`]; the chain
    /// treats that like any other per-source failure and falls through.
    async fn fetch(&self, key: &FeedKey) -> Result<PriceQuote, FeedError>;
}
