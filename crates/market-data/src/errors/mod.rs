//! Error types and retry classification for the feed layer.
//!
//! This module provides:
//! - [`FeedError`]: The main error enum for all feed operations
//! - [`RetryClass`]: Classification for determining retry behavior

mod retry;

pub use retry::RetryClass;

use thiserror::Error;

/// Longest error message stored in breaker and health records.
const MAX_STORED_ERROR_LEN: usize = 200;

/// Truncate an error message for storage in health and breaker records.
pub(crate) fn truncate_error(message: &str) -> String {
    if message.len() <= MAX_STORED_ERROR_LEN {
        return message.to_string();
    }
    let mut end = MAX_STORED_ERROR_LEN;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &message[..end])
}

/// Errors that can occur while fetching a value through the feed layer.
///
/// Each variant is classified into a [`RetryClass`] via the
/// [`retry_class`](Self::retry_class) method, which determines how the retry
/// executor and the fallback chain handle it.
#[derive(Error, Debug)]
pub enum FeedError {
    /// The symbol or pair is unknown to the source.
    /// Terminal for this source - retrying won't help.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The source cannot serve this kind of key (e.g. a spot-only source
    /// asked for a DEX pair). The chain falls through to the next source.
    #[error("Key not supported by {src}: {key}")]
    UnsupportedKey {
        /// The source that rejected the key
        src: String,
        /// The rendered key
        key: String,
    },

    /// The source rate limited the request (HTTP 429).
    /// Should retry with exponential backoff.
    #[error("Rate limited: {src}")]
    RateLimited {
        /// The source that rate limited the request
        src: String,
    },

    /// The request to the source timed out.
    /// Should retry with exponential backoff.
    #[error("Timeout: {src}")]
    Timeout {
        /// The source that timed out
        src: String,
    },

    /// The source answered with a non-success HTTP status.
    /// Retried only when the status is in the retry policy's retryable set.
    #[error("HTTP {status} from {src}")]
    Status {
        /// The source that returned the status
        src: String,
        /// The HTTP status code
        status: u16,
    },

    /// A source-specific error occurred (malformed body, protocol error).
    /// Terminal for this source; the chain tries the next one.
    #[error("Source error: {src} - {message}")]
    SourceError {
        /// The source that returned the error
        src: String,
        /// The error message from the source
        message: String,
    },

    /// The source returned structurally well-formed but semantically
    /// invalid data (non-positive price, self-reported DOWN status).
    #[error("Validation failed: {message}")]
    ValidationFailed {
        /// Description of the validation failure
        message: String,
    },

    /// The circuit breaker is open for this source; the call was
    /// short-circuited without an attempt.
    #[error("Circuit open: {src} (last error: {last_error})")]
    CircuitOpen {
        /// The source with an open circuit
        src: String,
        /// The error that opened the circuit
        last_error: String,
    },

    /// A lookup key failed to parse.
    #[error("Invalid feed key: {0}")]
    InvalidKey(String),

    /// A configured priority list names a source that was never registered.
    #[error("Unknown source in priority list: {name}")]
    UnknownSource {
        /// The unregistered name
        name: String,
    },

    /// The chain was built with an empty source list.
    #[error("No sources configured")]
    NoSourcesConfigured,

    /// Every source failed or was skipped and no fresh cache entry exists.
    /// The summary names each source and its specific failure reason.
    #[error("All sources failed: {summary}")]
    AllSourcesFailed {
        /// Per-source failure reasons in priority order
        summary: String,
    },

    /// A network error occurred while communicating with a source.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl FeedError {
    /// Returns the retry classification for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use quotewatch_market_data::errors::{FeedError, RetryClass};
    ///
    /// let error = FeedError::RateLimited { src: "COINGECKO".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::Transient);
    ///
    /// let error = FeedError::NotFound("spot:INVALID".to_string());
    /// assert_eq!(error.retry_class(), RetryClass::Fatal);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            // Transient - retry the same source with backoff
            Self::RateLimited { .. }
            | Self::Timeout { .. }
            | Self::Status { .. }
            | Self::Network(_) => RetryClass::Transient,

            // Circuit breaker open
            Self::CircuitOpen { .. } => RetryClass::CircuitOpen,

            // Everything else is terminal for the current source
            Self::NotFound(_)
            | Self::UnsupportedKey { .. }
            | Self::SourceError { .. }
            | Self::ValidationFailed { .. }
            | Self::InvalidKey(_)
            | Self::UnknownSource { .. }
            | Self::NoSourcesConfigured
            | Self::AllSourcesFailed { .. } => RetryClass::Fatal,
        }
    }

    /// The HTTP status carried by this error, if any.
    ///
    /// Used by the retry executor to consult the policy's retryable set.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::RateLimited { .. } => Some(429),
            _ => None,
        }
    }
}
