//! Server configuration from environment variables.

use std::time::Duration;

/// Runtime configuration, read once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    /// Address to listen on.
    pub listen_addr: String,
    /// Source priority order, highest first.
    pub sources: Vec<String>,
    /// Maximum age of a servable last-known-good entry.
    pub cache_max_age: Duration,
    /// Optional CoinGecko demo API key.
    pub coingecko_api_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        let listen_addr = std::env::var("QUOTEWATCH_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string());

        let sources = std::env::var("QUOTEWATCH_SOURCES")
            .unwrap_or_else(|_| "coingecko,dexscreener".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let cache_max_age = std::env::var("QUOTEWATCH_CACHE_MAX_AGE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(300));

        let coingecko_api_key = std::env::var("COINGECKO_API_KEY").ok().filter(|k| !k.is_empty());

        Self {
            listen_addr,
            sources,
            cache_max_age,
            coingecko_api_key,
        }
    }
}
