//! DexScreener source for DEX pair snapshots.
//!
//! Fetches pair snapshots from the DexScreener pairs API, addressed by
//! chain identifier and pair address. When the API returns several pools
//! for one address, the one with the deepest USD liquidity is used.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::errors::FeedError;
use crate::models::{FeedKey, PriceQuote};
use crate::source::QuoteSource;

/// Source ID constant
const SOURCE_ID: &str = "DEXSCREENER";

/// Default HTTP request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const BASE_URL: &str = "https://api.dexscreener.com/latest/dex";

/// Top-level pairs response.
#[derive(Debug, Deserialize)]
struct PairsResponse {
    pairs: Option<Vec<PairData>>,
}

/// One pool as reported by DexScreener.
#[derive(Debug, Deserialize)]
struct PairData {
    /// Price in USD, as a decimal string.
    #[serde(rename = "priceUsd")]
    price_usd: Option<String>,
    liquidity: Option<Liquidity>,
    volume: Option<VolumeData>,
    #[serde(rename = "baseToken")]
    base_token: Option<TokenInfo>,
}

#[derive(Debug, Deserialize)]
struct Liquidity {
    usd: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct VolumeData {
    h24: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    symbol: Option<String>,
}

/// DexScreener source for DEX pair snapshots.
pub struct DexScreenerSource {
    client: Client,
}

impl DexScreenerSource {
    /// Create a new DexScreener source. The public API needs no key.
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client }
    }

    /// The priced pool with the deepest USD liquidity.
    fn best_pair(pairs: Vec<PairData>) -> Option<PairData> {
        pairs
            .into_iter()
            .filter(|p| p.price_usd.is_some())
            .max_by(|a, b| {
                let la = a.liquidity.as_ref().and_then(|l| l.usd).unwrap_or(0.0);
                let lb = b.liquidity.as_ref().and_then(|l| l.usd).unwrap_or(0.0);
                la.total_cmp(&lb)
            })
    }
}

impl Default for DexScreenerSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QuoteSource for DexScreenerSource {
    fn name(&self) -> &'static str {
        SOURCE_ID
    }

    async fn fetch(&self, key: &FeedKey) -> Result<PriceQuote, FeedError> {
        let (chain, address) = match key {
            FeedKey::DexPair { chain, address } => (chain, address),
            FeedKey::Spot { .. } => {
                return Err(FeedError::UnsupportedKey {
                    src: SOURCE_ID.to_string(),
                    key: key.to_string(),
                })
            }
        };

        let url = format!("{}/pairs/{}/{}", BASE_URL, chain, address);

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

        let body: PairsResponse =
            response.json().await.map_err(|e| FeedError::SourceError {
                src: SOURCE_ID.to_string(),
                message: format!("malformed response: {}", e),
            })?;

        let pair = body
            .pairs
            .filter(|p| !p.is_empty())
            .and_then(Self::best_pair)
            .ok_or_else(|| FeedError::NotFound(key.to_string()))?;

        if let Some(symbol) = pair.base_token.as_ref().and_then(|t| t.symbol.as_deref()) {
            debug!("'{}': resolved {} to pool of {}", SOURCE_ID, key, symbol);
        }

        // best_pair only keeps priced pools
        let price_str = pair.price_usd.as_deref().unwrap_or_default();
        let price = Decimal::from_str(price_str).map_err(|e| FeedError::SourceError {
            src: SOURCE_ID.to_string(),
            message: format!("unparseable priceUsd '{}': {}", price_str, e),
        })?;

        let mut quote = PriceQuote::new(price, "USD", SOURCE_ID);
        if let Some(vol) = pair
            .volume
            .and_then(|v| v.h24)
            .and_then(Decimal::from_f64_retain)
        {
            quote = quote.with_volume(vol);
        }
        Ok(quote)
    }
}
