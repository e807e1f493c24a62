//! Named catalog of quote sources.
//!
//! Maps configured names to source factories and materializes an ordered
//! source list (or a whole chain) from a priority list. The registry is a
//! constructed value passed to whatever builds the chain - there is no
//! process-wide registry, so tests can build independent chains with
//! independent registries.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::errors::FeedError;
use crate::source::QuoteSource;

use super::chain::{ChainConfig, FallbackChain};

type SourceFactory = Box<dyn Fn() -> Arc<dyn QuoteSource> + Send + Sync>;

/// Named catalog used to build an ordered chain from a configured priority
/// list.
#[derive(Default)]
pub struct SourceRegistry {
    factories: HashMap<String, SourceFactory>,
}

impl SourceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a source factory under a name.
    ///
    /// Names are matched case-insensitively when building; a second
    /// registration under the same name replaces the first.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn QuoteSource> + Send + Sync + 'static,
    {
        let name = name.into().to_ascii_lowercase();
        debug!("Registering source '{}'", name);
        self.factories.insert(name, Box::new(factory));
    }

    /// Materialize sources in the order given by `priority`.
    ///
    /// Fails fast with [`FeedError::UnknownSource`] if a configured name
    /// was never registered.
    pub fn build(&self, priority: &[&str]) -> Result<Vec<Arc<dyn QuoteSource>>, FeedError> {
        priority
            .iter()
            .map(|name| {
                self.factories
                    .get(&name.to_ascii_lowercase())
                    .map(|factory| factory())
                    .ok_or_else(|| FeedError::UnknownSource {
                        name: name.to_string(),
                    })
            })
            .collect()
    }

    /// Build a [`FallbackChain`] over the sources named by `priority`.
    pub fn build_chain(
        &self,
        priority: &[&str],
        config: ChainConfig,
    ) -> Result<FallbackChain, FeedError> {
        Ok(FallbackChain::with_config(self.build(priority)?, config))
    }

    /// Registered names, unordered.
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FeedKey, PriceQuote};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    struct StaticSource(&'static str);

    #[async_trait]
    impl QuoteSource for StaticSource {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn fetch(&self, _key: &FeedKey) -> Result<PriceQuote, FeedError> {
            Ok(PriceQuote::new(dec!(1), "USD", self.0))
        }
    }

    fn registry() -> SourceRegistry {
        let mut registry = SourceRegistry::new();
        registry.register("coingecko", || Arc::new(StaticSource("COINGECKO")));
        registry.register("dexscreener", || Arc::new(StaticSource("DEXSCREENER")));
        registry
    }

    #[test]
    fn test_build_preserves_priority_order() {
        let registry = registry();
        let sources = registry.build(&["dexscreener", "coingecko"]).unwrap();

        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].name(), "DEXSCREENER");
        assert_eq!(sources[1].name(), "COINGECKO");
    }

    #[test]
    fn test_names_are_case_insensitive() {
        let registry = registry();
        assert!(registry.build(&["CoinGecko"]).is_ok());
    }

    #[test]
    fn test_unknown_name_fails_fast() {
        let registry = registry();
        let result = registry.build(&["coingecko", "kraken"]);

        match result {
            Err(FeedError::UnknownSource { name }) => assert_eq!(name, "kraken"),
            other => panic!("expected UnknownSource, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_build_chain_is_usable() {
        let registry = registry();
        let chain = registry
            .build_chain(&["coingecko"], ChainConfig::default())
            .unwrap();

        let quote = chain.fetch(&FeedKey::spot("BTC")).await.unwrap();
        assert_eq!(quote.source, "COINGECKO");
    }
}
