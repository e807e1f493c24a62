use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::errors::FeedError;

/// Canonical lookup key for a fetched value.
///
/// Rendered and parsed in the wire form used throughout the system:
/// `spot:BTC` for a spot price, `dex:solana:8sLbNZoA1cfnvMJLPfp98ZLAnFSYCFApfJKMbiXNLwxj`
/// for a DEX pair snapshot. Spot symbols are normalized to upper case and
/// chain identifiers to lower case; pair addresses are kept verbatim since
/// some chains use case-sensitive encodings.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum FeedKey {
    /// Spot price for a ticker symbol.
    Spot { symbol: Arc<str> },

    /// DEX pair snapshot addressed by chain identifier and pair address.
    DexPair { chain: Arc<str>, address: Arc<str> },
}

impl FeedKey {
    /// Build a spot key, normalizing the symbol to upper case.
    pub fn spot(symbol: &str) -> Self {
        Self::Spot {
            symbol: Arc::from(symbol.to_ascii_uppercase().as_str()),
        }
    }

    /// Build a DEX pair key, normalizing the chain identifier to lower case.
    pub fn dex_pair(chain: &str, address: &str) -> Self {
        Self::DexPair {
            chain: Arc::from(chain.to_ascii_lowercase().as_str()),
            address: Arc::from(address),
        }
    }
}

impl fmt::Display for FeedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spot { symbol } => write!(f, "spot:{}", symbol),
            Self::DexPair { chain, address } => write!(f, "dex:{}:{}", chain, address),
        }
    }
}

impl FromStr for FeedKey {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');

        match (parts.next(), parts.next(), parts.next()) {
            (Some("spot"), Some(symbol), None) if !symbol.is_empty() => Ok(Self::spot(symbol)),
            (Some("dex"), Some(chain), Some(address))
                if !chain.is_empty() && !address.is_empty() =>
            {
                Ok(Self::dex_pair(chain, address))
            }
            _ => Err(FeedError::InvalidKey(s.to_string())),
        }
    }
}
