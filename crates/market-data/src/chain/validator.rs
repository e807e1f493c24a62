//! Fetched-value validation.
//!
//! Validates values from sources before they are accepted by the chain:
//! - positive price
//! - no self-reported DOWN status
//! - non-negative volume
//! - sanity ceiling on price (soft)
//!
//! A value that fails a hard check is treated exactly like a failed fetch
//! for breaker and health bookkeeping.

use log::warn;
use rust_decimal::Decimal;

use crate::errors::FeedError;
use crate::models::{FeedStatus, PriceQuote};

/// Validation severity levels.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationSeverity {
    /// Hard failure - reject the value, try the next source.
    Hard,
    /// Soft warning - accept the value but log a warning.
    Soft,
}

/// A single validation finding.
#[derive(Clone, Debug)]
struct ValidationIssue {
    severity: ValidationSeverity,
    message: String,
}

/// Validator configuration.
#[derive(Clone, Debug)]
pub struct ValidatorConfig {
    /// Whether to reject values with a non-positive price.
    pub reject_non_positive_price: bool,
    /// Whether to reject values whose source marked them DOWN.
    pub reject_down_status: bool,
    /// Maximum plausible price (sanity check, soft).
    pub max_price: Option<Decimal>,
    /// Whether to warn on zero volume.
    pub warn_on_zero_volume: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            reject_non_positive_price: true,
            reject_down_status: true,
            max_price: Some(Decimal::from(1_000_000_000i64)),
            warn_on_zero_volume: true,
        }
    }
}

/// Fetched-value validator.
pub struct QuoteValidator {
    config: ValidatorConfig,
}

impl QuoteValidator {
    /// Create a validator with default configuration.
    pub fn new() -> Self {
        Self {
            config: ValidatorConfig::default(),
        }
    }

    /// Create a validator with custom configuration.
    pub fn with_config(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Validate a fetched value.
    ///
    /// Returns `Ok(())` when the value is acceptable; warnings are logged
    /// but do not cause rejection.
    pub fn validate(&self, quote: &PriceQuote) -> Result<(), FeedError> {
        let mut issues: Vec<ValidationIssue> = Vec::new();

        if self.config.reject_non_positive_price && quote.price <= Decimal::ZERO {
            issues.push(ValidationIssue {
                severity: ValidationSeverity::Hard,
                message: format!("Non-positive price: {}", quote.price),
            });
        }

        if self.config.reject_down_status && quote.status == FeedStatus::Down {
            let detail = quote.error.as_deref().unwrap_or("no detail");
            issues.push(ValidationIssue {
                severity: ValidationSeverity::Hard,
                message: format!("Source '{}' reported DOWN: {}", quote.source, detail),
            });
        }

        if let Some(volume) = quote.volume_24h {
            if volume < Decimal::ZERO {
                issues.push(ValidationIssue {
                    severity: ValidationSeverity::Hard,
                    message: format!("Negative volume: {}", volume),
                });
            } else if self.config.warn_on_zero_volume && volume == Decimal::ZERO {
                issues.push(ValidationIssue {
                    severity: ValidationSeverity::Soft,
                    message: "Zero volume (market may be inactive)".to_string(),
                });
            }
        }

        if let Some(max_price) = self.config.max_price {
            if quote.price > max_price {
                issues.push(ValidationIssue {
                    severity: ValidationSeverity::Soft,
                    message: format!(
                        "Price ({}) exceeds sanity threshold ({})",
                        quote.price, max_price
                    ),
                });
            }
        }

        let errors: Vec<_> = issues
            .iter()
            .filter(|i| i.severity == ValidationSeverity::Hard)
            .collect();

        if !errors.is_empty() {
            let messages: Vec<_> = errors.iter().map(|e| e.message.as_str()).collect();
            return Err(FeedError::ValidationFailed {
                message: messages.join("; "),
            });
        }

        for issue in issues
            .iter()
            .filter(|i| i.severity == ValidationSeverity::Soft)
        {
            warn!(
                "Validation warning for '{}' from '{}': {}",
                quote.currency, quote.source, issue.message
            );
        }

        Ok(())
    }
}

impl Default for QuoteValidator {
    fn default() -> Self {
        Self::new()
    }
}
