//! Quotewatch Market Data Crate
//!
//! This crate provides source-agnostic market data fetching with explicit
//! failure-recovery policy for the quotewatch application.
//!
//! # Overview
//!
//! The feed layer supports:
//! - Multiple interchangeable sources: CoinGecko spot prices, DexScreener
//!   pair snapshots, or any custom [`QuoteSource`]
//! - Per-source circuit breaking with lazy half-open probing
//! - Bounded retry with exponential backoff
//! - A last-known-good cache serving degraded values when every live
//!   source fails
//! - Per-source health records and per-fetch diagnostics
//!
//! # Architecture
//!
//! ```text
//! +-----------------+     +------------------+
//! |     Caller      | --> |     FeedKey      |  (spot:BTC, dex:chain:pair)
//! +-----------------+     +------------------+
//!                                  |
//!                                  v
//!                         +------------------+
//!                         |  FallbackChain   |  (priority order, one source at a time)
//!                         +------------------+
//!                           |      |       |
//!              breaker gate | retry|       | last resort
//!                           v      v       v
//!                  +---------+ +--------+ +--------------------+
//!                  | Circuit | | Retry  | | LastKnownGoodCache |
//!                  | Breaker | | Policy | +--------------------+
//!                  +---------+ +--------+
//!                                  |
//!                                  v
//!                         +------------------+
//!                         |   QuoteSource    |  (CoinGecko, DexScreener, ...)
//!                         +------------------+
//!                                  |
//!                                  v
//!                         +------------------+
//!                         |    PriceQuote    |  (OK | DEGRADED, never DOWN)
//!                         +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`FeedKey`] - Canonical lookup key for a fetched value
//! - [`PriceQuote`] - Fetched value with source, timestamp, and status tag
//! - [`FallbackChain`] - Ordered multi-source chain, the public entry point
//! - [`SourceRegistry`] - Named catalog that materializes a chain from a
//!   configured priority list
//! - [`HealthRecord`] - Per-source health snapshot
//! - [`CircuitState`] - Observable breaker state (CLOSED/OPEN/HALF_OPEN)

pub mod chain;
pub mod errors;
pub mod models;
pub mod source;

// Re-export all public types from models
pub use models::{FeedKey, FeedStatus, HealthRecord, HealthThresholds, PriceQuote, SourceId};

// Re-export source types
pub use source::coingecko::CoinGeckoSource;
pub use source::dexscreener::DexScreenerSource;
pub use source::QuoteSource;

// Re-export chain types
pub use chain::{
    ChainConfig, CircuitBreaker, CircuitBreakerConfig, CircuitState, FallbackChain,
    FetchDiagnostics, LastKnownGoodCache, QuoteValidator, RetryPolicy, SkipReason, SourceAttempt,
    SourceRegistry,
};

// Re-export error types
pub use errors::{FeedError, RetryClass};
