use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Status of a source or of a fetched value.
///
/// A [`PriceQuote`] handed to a caller is only ever `Ok` or `Degraded`;
/// `Down` exists for health records and for sources that report their own
/// outage in-band.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedStatus {
    #[default]
    Ok,
    Degraded,
    Down,
}

impl std::fmt::Display for FeedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Degraded => write!(f, "DEGRADED"),
            Self::Down => write!(f, "DOWN"),
        }
    }
}

/// A fetched market value: spot price or DEX pair snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Current price in `currency` (required).
    pub price: Decimal,

    /// 24h trading volume, when the source reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_24h: Option<Decimal>,

    /// Quote currency.
    pub currency: String,

    /// Source of the quote (COINGECKO, DEXSCREENER, ...). A last-known-good
    /// fallback read carries an `" (lkg)"` suffix here.
    pub source: String,

    /// When the value was fetched.
    pub fetched_at: DateTime<Utc>,

    /// Quality tag for this value.
    pub status: FeedStatus,

    /// Error message, if the source attached one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PriceQuote {
    /// Create a healthy quote stamped with the current time.
    pub fn new(price: Decimal, currency: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            price,
            volume_24h: None,
            currency: currency.into(),
            source: source.into(),
            fetched_at: Utc::now(),
            status: FeedStatus::Ok,
            error: None,
        }
    }

    /// Attach a 24h volume.
    pub fn with_volume(mut self, volume_24h: Decimal) -> Self {
        self.volume_24h = Some(volume_24h);
        self
    }
}
