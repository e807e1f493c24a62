//! Ordered multi-source fallback chain.
//!
//! The public entry point of the feed layer. Given a lookup key, the chain
//! tries each configured source in a fixed priority order, skipping sources
//! whose breaker is open, retrying each attempted source per the retry
//! policy, validating the result, and falling back progressively - first to
//! the next source, finally to the last-known-good cache.
//!
//! All mutable state (breakers, health records, cache) is chain-scoped and
//! internally synchronized; a chain can be shared behind an `Arc` across
//! concurrent callers. No lock is held across an `.await`, and the state
//! updates for one source attempt complete before the next source is
//! tried.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::errors::FeedError;
use crate::models::{
    FeedKey, FeedStatus, HealthRecord, HealthThresholds, PriceQuote, SourceId,
};
use crate::source::QuoteSource;

use super::cache::LastKnownGoodCache;
use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use super::diagnostics::{FetchDiagnostics, SkipReason};
use super::health::HealthTracker;
use super::retry::{resilient_call, RetryPolicy};
use super::validator::QuoteValidator;

/// Suffix marking a value served from the last-known-good cache.
const LKG_SUFFIX: &str = " (lkg)";

/// Configuration for a fallback chain.
#[derive(Clone, Debug, Default)]
pub struct ChainConfig {
    /// Retry policy applied to every source call.
    pub retry: RetryPolicy,
    /// Circuit breaker settings shared by all per-source breakers.
    pub breaker: CircuitBreakerConfig,
    /// Consecutive-failure thresholds for health status.
    pub health: HealthThresholds,
    /// Maximum age of a servable last-known-good entry.
    pub cache_max_age: Option<Duration>,
}

/// Ordered multi-source fallback chain.
pub struct FallbackChain {
    sources: Vec<Arc<dyn QuoteSource>>,
    breakers: CircuitBreaker,
    health: HealthTracker,
    cache: LastKnownGoodCache,
    validator: QuoteValidator,
    retry: RetryPolicy,
}

impl FallbackChain {
    /// Create a chain over `sources` (highest priority first) with default
    /// configuration.
    pub fn new(sources: Vec<Arc<dyn QuoteSource>>) -> Self {
        Self::with_config(sources, ChainConfig::default())
    }

    /// Create a chain with custom configuration.
    pub fn with_config(sources: Vec<Arc<dyn QuoteSource>>, config: ChainConfig) -> Self {
        let names = sources.iter().map(|s| s.name().to_string());
        let health = HealthTracker::new(config.health, names);
        let cache = match config.cache_max_age {
            Some(max_age) => LastKnownGoodCache::with_max_age(max_age),
            None => LastKnownGoodCache::new(),
        };
        Self {
            sources,
            breakers: CircuitBreaker::with_config(config.breaker),
            health,
            cache,
            validator: QuoteValidator::new(),
            retry: config.retry,
        }
    }

    /// Fetch the freshest trustworthy value for `key`.
    ///
    /// Sources are tried strictly in configured order. The first valid
    /// result updates that source's health record and the cache, and is
    /// returned immediately. If every source fails or is skipped, a fresh
    /// cache entry is served with its status forced to `Degraded` and its
    /// source suffixed `" (lkg)"`; with no fresh entry the call fails with
    /// [`FeedError::AllSourcesFailed`] naming every source's reason.
    pub async fn fetch(&self, key: &FeedKey) -> Result<PriceQuote, FeedError> {
        if self.sources.is_empty() {
            return Err(FeedError::NoSourcesConfigured);
        }

        let mut diagnostics = FetchDiagnostics::new();

        for source in &self.sources {
            let id: SourceId = Cow::Borrowed(source.name());

            if self.breakers.is_open(&id) {
                debug!("'{}': circuit open, skipping for '{}'", id, key);
                diagnostics.record_skip(
                    id.clone(),
                    SkipReason::CircuitBreakerOpen {
                        last_error: self.breakers.last_error(&id),
                    },
                );
                continue;
            }

            // Validation happens inside the retried operation: a value that
            // fails the validity predicate counts as a failed attempt for
            // breaker and health bookkeeping, identical to a raised error.
            let result = resilient_call(&id, &self.retry, Some(&self.breakers), || async move {
                let quote = source.fetch(key).await?;
                self.validator.validate(&quote)?;
                Ok(quote)
            })
            .await;

            match result {
                Ok(quote) => {
                    self.health.record_success(&id);
                    self.cache.put(key, quote.clone());
                    info!("'{}': fetched '{}' = {} {}", id, key, quote.price, quote.currency);
                    return Ok(quote);
                }
                Err(error) => {
                    let message = error.to_string();
                    self.health
                        .record_failure(&id, &message, self.breaker_retry_after(&id));
                    debug!(
                        "'{}': failed for '{}': {}, trying next source",
                        id, key, message
                    );
                    diagnostics.record_error(id.clone(), message);
                }
            }
        }

        // Every source was attempted or skipped; fall back to the cache.
        if let Some(mut quote) = self.cache.get(key) {
            warn!(
                "All sources failed for '{}', serving last known good from '{}'",
                key, quote.source
            );
            quote.status = FeedStatus::Degraded;
            quote.source.push_str(LKG_SUFFIX);
            return Ok(quote);
        }

        Err(FeedError::AllSourcesFailed {
            summary: diagnostics.summary(),
        })
    }

    /// Current health record for every configured source.
    /// Point-in-time snapshot with no side effects.
    pub fn health(&self) -> HashMap<String, HealthRecord> {
        self.health.snapshot()
    }

    /// Current observable breaker state for every configured source.
    /// Point-in-time snapshot with no side effects.
    pub fn breaker_states(&self) -> HashMap<String, CircuitState> {
        self.sources
            .iter()
            .map(|s| {
                let id: SourceId = Cow::Borrowed(s.name());
                (s.name().to_string(), self.breakers.state(&id))
            })
            .collect()
    }

    /// The configured sources in priority order.
    pub fn sources(&self) -> &[Arc<dyn QuoteSource>] {
        &self.sources
    }

    /// Force a source's breaker back to closed. Manual recovery hook.
    pub fn reset_breaker(&self, source: &SourceId) {
        self.breakers.reset(source);
    }

    /// The wall-clock time at which an open breaker will next allow a
    /// probe, for health records.
    fn breaker_retry_after(&self, source: &SourceId) -> Option<DateTime<Utc>> {
        if !self.breakers.is_open(source) {
            return None;
        }
        let cooldown = chrono::Duration::from_std(self.breakers.config().cooldown).ok()?;
        Some(Utc::now() + cooldown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Scripted source for chain tests.
    struct MockSource {
        name: &'static str,
        price: Decimal,
        /// Fail this many attempts before succeeding; `u32::MAX` = always.
        fail_first: u32,
        /// When set, fail regardless of `fail_first`.
        forced_failure: AtomicBool,
        /// When set, return a structurally valid but non-positive price.
        invalid: bool,
        calls: AtomicUsize,
    }

    impl MockSource {
        fn ok(name: &'static str, price: Decimal) -> Arc<Self> {
            Self::scripted(name, price, 0)
        }

        fn failing(name: &'static str) -> Arc<Self> {
            Self::scripted(name, dec!(0), u32::MAX)
        }

        fn scripted(name: &'static str, price: Decimal, fail_first: u32) -> Arc<Self> {
            Arc::new(Self {
                name,
                price,
                fail_first,
                forced_failure: AtomicBool::new(false),
                invalid: false,
                calls: AtomicUsize::new(0),
            })
        }

        fn invalid(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                price: dec!(0),
                fail_first: 0,
                forced_failure: AtomicBool::new(false),
                invalid: true,
                calls: AtomicUsize::new(0),
            })
        }

        fn set_failing(&self, failing: bool) {
            self.forced_failure.store(failing, Ordering::SeqCst);
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl QuoteSource for MockSource {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn fetch(&self, _key: &FeedKey) -> Result<PriceQuote, FeedError> {
            let attempt = self.calls.fetch_add(1, Ordering::SeqCst) as u32;

            if self.forced_failure.load(Ordering::SeqCst) || attempt < self.fail_first {
                return Err(FeedError::Timeout {
                    src: self.name.to_string(),
                });
            }
            if self.invalid {
                return Ok(PriceQuote::new(dec!(0), "USD", self.name));
            }
            Ok(PriceQuote::new(self.price, "USD", self.name))
        }
    }

    fn fast_config() -> ChainConfig {
        ChainConfig {
            retry: RetryPolicy {
                max_attempts: 1,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
                backoff_multiplier: 2.0,
                ..Default::default()
            },
            breaker: CircuitBreakerConfig {
                failure_threshold: 2,
                cooldown: Duration::from_millis(100),
            },
            health: HealthThresholds::default(),
            cache_max_age: Some(Duration::from_secs(300)),
        }
    }

    fn chain_of(sources: &[&Arc<MockSource>], config: ChainConfig) -> FallbackChain {
        let sources: Vec<Arc<dyn QuoteSource>> = sources
            .iter()
            .map(|s| Arc::clone(*s) as Arc<dyn QuoteSource>)
            .collect();
        FallbackChain::with_config(sources, config)
    }

    #[tokio::test]
    async fn test_first_source_wins_and_rest_untouched() {
        let a = MockSource::ok("A", dec!(100));
        let b = MockSource::ok("B", dec!(200));
        let chain = chain_of(&[&a, &b], fast_config());

        let quote = chain.fetch(&FeedKey::spot("BTC")).await.unwrap();

        assert_eq!(quote.price, dec!(100));
        assert_eq!(quote.source, "A");
        assert_eq!(quote.status, FeedStatus::Ok);
        assert_eq!(a.call_count(), 1);
        assert_eq!(b.call_count(), 0);
    }

    #[tokio::test]
    async fn test_fallback_to_second_source() {
        let a = MockSource::failing("A");
        let b = MockSource::ok("B", dec!(200));
        let chain = chain_of(&[&a, &b], fast_config());

        let quote = chain.fetch(&FeedKey::spot("BTC")).await.unwrap();

        assert_eq!(quote.price, dec!(200));
        assert_eq!(quote.source, "B");

        let health = chain.health();
        assert!(health["A"].consecutive_failures >= 1);
        assert_eq!(health["B"].consecutive_failures, 0);
        assert_eq!(health["B"].status, FeedStatus::Ok);
    }

    #[tokio::test]
    async fn test_retry_within_one_source() {
        // B fails twice, succeeds on the third attempt of a single fetch.
        let a = MockSource::failing("A");
        let b = MockSource::scripted("B", dec!(101.0), 2);
        let mut config = fast_config();
        config.retry.max_attempts = 3;
        let chain = chain_of(&[&a, &b], config);

        let quote = chain.fetch(&FeedKey::spot("SYM")).await.unwrap();

        assert_eq!(quote.price, dec!(101.0));
        assert_eq!(quote.source, "B");
        assert_eq!(quote.status, FeedStatus::Ok);
        assert_eq!(b.call_count(), 3);

        let health = chain.health();
        assert!(health["A"].consecutive_failures >= 1);
        assert_eq!(health["B"].status, FeedStatus::Ok);
        assert_eq!(health["B"].consecutive_failures, 0);
        // The whole retry sequence reads as one success to B's breaker
        assert_eq!(chain.breaker_states()["B"], CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_breaker_opens_and_source_is_skipped() {
        let a = MockSource::failing("A");
        let b = MockSource::ok("B", dec!(50));
        let chain = chain_of(&[&a, &b], fast_config());
        let key = FeedKey::spot("BTC");

        // failure_threshold = 2: two fetches open A's breaker
        chain.fetch(&key).await.unwrap();
        chain.fetch(&key).await.unwrap();
        assert_eq!(chain.breaker_states()["A"], CircuitState::Open);

        let calls_before = a.call_count();
        let quote = chain.fetch(&key).await.unwrap();
        // A was skipped, not attempted
        assert_eq!(a.call_count(), calls_before);
        assert_eq!(quote.source, "B");
    }

    #[tokio::test]
    async fn test_breaker_half_opens_by_observation() {
        let a = MockSource::failing("A");
        let b = MockSource::ok("B", dec!(50));
        let chain = chain_of(&[&a, &b], fast_config());
        let key = FeedKey::spot("BTC");

        chain.fetch(&key).await.unwrap();
        chain.fetch(&key).await.unwrap();
        assert_eq!(chain.breaker_states()["A"], CircuitState::Open);

        // Cooldown is 100ms; only reads happen in between
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(chain.breaker_states()["A"], CircuitState::HalfOpen);
    }

    #[tokio::test]
    async fn test_half_open_probe_recovers_source() {
        let a = MockSource::ok("A", dec!(99));
        a.set_failing(true);
        let b = MockSource::ok("B", dec!(50));
        let chain = chain_of(&[&a, &b], fast_config());
        let key = FeedKey::spot("BTC");

        chain.fetch(&key).await.unwrap();
        chain.fetch(&key).await.unwrap();
        assert_eq!(chain.breaker_states()["A"], CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(150)).await;

        // A recovers; the half-open probe is attempted, succeeds, and
        // closes the circuit
        a.set_failing(false);
        let quote = chain.fetch(&key).await.unwrap();
        assert_eq!(quote.source, "A");
        assert_eq!(chain.breaker_states()["A"], CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_last_known_good_served_when_all_fail() {
        let a = MockSource::ok("A", dec!(123.45));
        let chain = chain_of(&[&a], fast_config());
        let key = FeedKey::spot("X");

        let live = chain.fetch(&key).await.unwrap();
        assert_eq!(live.status, FeedStatus::Ok);

        a.set_failing(true);
        let fallback = chain.fetch(&key).await.unwrap();

        assert_eq!(fallback.price, dec!(123.45));
        assert_eq!(fallback.status, FeedStatus::Degraded);
        assert_eq!(fallback.source, "A (lkg)");
    }

    #[tokio::test]
    async fn test_stale_cache_is_not_served() {
        let a = MockSource::ok("A", dec!(123.45));
        let mut config = fast_config();
        config.cache_max_age = Some(Duration::ZERO);
        let chain = chain_of(&[&a], config);
        let key = FeedKey::spot("X");

        chain.fetch(&key).await.unwrap();
        a.set_failing(true);
        tokio::time::sleep(Duration::from_millis(5)).await;

        let result = chain.fetch(&key).await;
        assert!(matches!(result, Err(FeedError::AllSourcesFailed { .. })));
    }

    #[tokio::test]
    async fn test_total_failure_error_names_every_source() {
        let a = MockSource::failing("ALPHA");
        let b = MockSource::failing("BRAVO");
        let chain = chain_of(&[&a, &b], fast_config());

        let error = chain.fetch(&FeedKey::spot("BTC")).await.unwrap_err();
        let message = error.to_string();

        assert!(message.contains("ALPHA"), "missing ALPHA in: {}", message);
        assert!(message.contains("BRAVO"), "missing BRAVO in: {}", message);
    }

    #[tokio::test]
    async fn test_skip_reason_appears_in_aggregated_error() {
        let a = MockSource::failing("ALPHA");
        let b = MockSource::failing("BRAVO");
        let chain = chain_of(&[&a, &b], fast_config());
        let key = FeedKey::spot("BTC");

        // Open both breakers (threshold 2), then fail once more
        let _ = chain.fetch(&key).await;
        let _ = chain.fetch(&key).await;
        let error = chain.fetch(&key).await.unwrap_err();
        let message = error.to_string();

        assert!(message.contains("SKIPPED"), "expected skips in: {}", message);
        assert!(message.contains("ALPHA") && message.contains("BRAVO"));
    }

    #[tokio::test]
    async fn test_invalid_value_treated_as_failure() {
        // A returns a parseable but non-positive price; B is healthy
        let a = MockSource::invalid("A");
        let b = MockSource::ok("B", dec!(75));
        let chain = chain_of(&[&a, &b], fast_config());

        let quote = chain.fetch(&FeedKey::spot("BTC")).await.unwrap();

        assert_eq!(quote.source, "B");
        let health = chain.health();
        assert_eq!(health["A"].consecutive_failures, 1);
        assert!(health["A"].last_error.as_deref().unwrap().contains("Non-positive"));
    }

    #[tokio::test]
    async fn test_invalid_values_eventually_open_breaker() {
        let a = MockSource::invalid("A");
        let b = MockSource::ok("B", dec!(75));
        let chain = chain_of(&[&a, &b], fast_config());
        let key = FeedKey::spot("BTC");

        chain.fetch(&key).await.unwrap();
        chain.fetch(&key).await.unwrap();

        // Two validation rejections reach the threshold like raised errors
        assert_eq!(chain.breaker_states()["A"], CircuitState::Open);
    }

    #[tokio::test]
    async fn test_empty_chain_fails_fast() {
        let chain = FallbackChain::new(Vec::new());
        let result = chain.fetch(&FeedKey::spot("BTC")).await;
        assert!(matches!(result, Err(FeedError::NoSourcesConfigured)));
    }

    #[tokio::test]
    async fn test_health_snapshot_covers_all_sources() {
        let a = MockSource::ok("A", dec!(1));
        let b = MockSource::ok("B", dec!(2));
        let chain = chain_of(&[&a, &b], fast_config());

        // Without any fetch, every configured source is reported
        let health = chain.health();
        assert_eq!(health.len(), 2);
        assert!(health.contains_key("A") && health.contains_key("B"));

        let states = chain.breaker_states();
        assert_eq!(states["A"], CircuitState::Closed);
        assert_eq!(states["B"], CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_down_health_after_streak() {
        let a = MockSource::failing("A");
        let b = MockSource::ok("B", dec!(75));
        let mut config = fast_config();
        // Keep the breaker out of the way so every fetch reaches A
        config.breaker.failure_threshold = 100;
        let chain = chain_of(&[&a, &b], config);
        let key = FeedKey::spot("BTC");

        for _ in 0..5 {
            chain.fetch(&key).await.unwrap();
        }

        let health = chain.health();
        assert_eq!(health["A"].status, FeedStatus::Down);
        assert_eq!(health["A"].consecutive_failures, 5);
        assert_eq!(health["B"].status, FeedStatus::Ok);
    }

    #[tokio::test]
    async fn test_reset_breaker() {
        let a = MockSource::failing("A");
        let b = MockSource::ok("B", dec!(75));
        let chain = chain_of(&[&a, &b], fast_config());
        let key = FeedKey::spot("BTC");

        chain.fetch(&key).await.unwrap();
        chain.fetch(&key).await.unwrap();
        assert_eq!(chain.breaker_states()["A"], CircuitState::Open);

        chain.reset_breaker(&Cow::Borrowed("A"));
        assert_eq!(chain.breaker_states()["A"], CircuitState::Closed);
    }
}
