//! CoinGecko source for spot prices.
//!
//! Fetches current USD prices from the CoinGecko simple-price API. Symbols
//! are mapped to CoinGecko coin ids through a built-in table covering the
//! majors; unknown symbols fail fast without a request.
//!
//! The free tier needs no API key; a demo key can be attached to raise the
//! rate limit.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::errors::FeedError;
use crate::models::{FeedKey, PriceQuote};
use crate::source::QuoteSource;

/// Source ID constant
const SOURCE_ID: &str = "COINGECKO";

/// Default HTTP request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// Symbol -> CoinGecko coin id, for the symbols the tracker follows.
const COIN_IDS: &[(&str, &str)] = &[
    ("BTC", "bitcoin"),
    ("ETH", "ethereum"),
    ("SOL", "solana"),
    ("BNB", "binancecoin"),
    ("XRP", "ripple"),
    ("ADA", "cardano"),
    ("DOGE", "dogecoin"),
    ("DOT", "polkadot"),
    ("AVAX", "avalanche-2"),
    ("LINK", "chainlink"),
    ("MATIC", "matic-network"),
    ("LTC", "litecoin"),
    ("UNI", "uniswap"),
    ("ATOM", "cosmos"),
];

/// Per-coin entry in the simple-price response.
#[derive(Debug, Deserialize)]
struct SimplePrice {
    usd: Option<f64>,
    #[serde(rename = "usd_24h_vol")]
    usd_24h_vol: Option<f64>,
}

/// CoinGecko source for spot prices.
pub struct CoinGeckoSource {
    client: Client,
    api_key: Option<String>,
}

impl CoinGeckoSource {
    /// Create a keyless source (free tier).
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key: None,
        }
    }

    /// Create a source that sends a demo API key with each request.
    pub fn with_api_key(api_key: String) -> Self {
        Self {
            api_key: Some(api_key),
            ..Self::new()
        }
    }

    /// CoinGecko coin id for a ticker symbol.
    fn coin_id(symbol: &str) -> Option<&'static str> {
        COIN_IDS
            .iter()
            .find(|(sym, _)| sym.eq_ignore_ascii_case(symbol))
            .map(|(_, id)| *id)
    }
}

impl Default for CoinGeckoSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QuoteSource for CoinGeckoSource {
    fn name(&self) -> &'static str {
        SOURCE_ID
    }

    async fn fetch(&self, key: &FeedKey) -> Result<PriceQuote, FeedError> {
        let symbol = match key {
            FeedKey::Spot { symbol } => symbol,
            FeedKey::DexPair { .. } => {
                return Err(FeedError::UnsupportedKey {
                    src: SOURCE_ID.to_string(),
                    key: key.to_string(),
                })
            }
        };

        let id = Self::coin_id(symbol).ok_or_else(|| FeedError::NotFound(key.to_string()))?;

        let mut url = format!(
            "{}/simple/price?ids={}&vs_currencies=usd&include_24hr_vol=true",
            BASE_URL, id
        );
        if let Some(api_key) = &self.api_key {
            url.push_str("&x_cg_demo_api_key=");
            url.push_str(api_key);
        }

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                FeedError::Timeout {
                    src: SOURCE_ID.to_string(),
                }
            } else {
                FeedError::Network(e)
            }
        })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(FeedError::RateLimited {
                src: SOURCE_ID.to_string(),
            });
        }
        if !status.is_success() {
            return Err(FeedError::Status {
                src: SOURCE_ID.to_string(),
                status: status.as_u16(),
            });
        }

        let body: HashMap<String, SimplePrice> =
            response.json().await.map_err(|e| FeedError::SourceError {
                src: SOURCE_ID.to_string(),
                message: format!("malformed response: {}", e),
            })?;

        // CoinGecko answers 200 with an empty object for unknown ids
        let entry = body
            .get(id)
            .ok_or_else(|| FeedError::NotFound(key.to_string()))?;

        let usd = entry.usd.ok_or_else(|| FeedError::SourceError {
            src: SOURCE_ID.to_string(),
            message: format!("no usd price for '{}'", id),
        })?;
        let price = Decimal::from_f64_retain(usd).ok_or_else(|| FeedError::SourceError {
            src: SOURCE_ID.to_string(),
            message: format!("unrepresentable price: {}", usd),
        })?;

        let mut quote = PriceQuote::new(price, "USD", SOURCE_ID);
        if let Some(vol) = entry.usd_24h_vol.and_then(Decimal::from_f64_retain) {
            quote = quote.with_volume(vol);
        }
        Ok(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coin_id_lookup() {
        assert_eq!(CoinGeckoSource::coin_id("BTC"), Some("bitcoin"));
        assert_eq!(CoinGeckoSource::coin_id("eth"), Some("ethereum"));
        assert_eq!(CoinGeckoSource::coin_id("NOPE"), None);
    }

    #[tokio::test]
    async fn test_dex_key_unsupported_without_request() {
        let source = CoinGeckoSource::new();
        let key = FeedKey::dex_pair("solana", "somepair");

        let result = source.fetch(&key).await;
        assert!(matches!(result, Err(FeedError::UnsupportedKey { .. })));
    }

    #[tokio::test]
    async fn test_unknown_symbol_fails_without_request() {
        let source = CoinGeckoSource::new();
        let key = FeedKey::spot("NOPE");

        let result = source.fetch(&key).await;
        assert!(matches!(result, Err(FeedError::NotFound(_))));
    }

    #[test]
    fn test_simple_price_parsing() {
        let json = r#"{"bitcoin": {"usd": 64250.5, "usd_24h_vol": 1234567.0}}"#;
        let body: HashMap<String, SimplePrice> = serde_json::from_str(json).unwrap();
        let entry = &body["bitcoin"];
        assert_eq!(entry.usd, Some(64250.5));
        assert_eq!(entry.usd_24h_vol, Some(1234567.0));
    }
}
