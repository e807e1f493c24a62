//! Per-attempt diagnostics for a single fetch through the chain.
//!
//! Every source attempt in a `fetch` call is recorded here, so the terminal
//! failure can name each source and why it did not produce a value -
//! enough to tell "everything is down" apart from "one misconfigured
//! source" without consulting logs.

use crate::models::SourceId;

/// Why a source was not attempted during a fetch.
#[derive(Clone, Debug)]
pub enum SkipReason {
    /// Circuit breaker is open for this source.
    CircuitBreakerOpen {
        /// The failure that opened the circuit, if recorded.
        last_error: Option<String>,
    },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CircuitBreakerOpen { last_error } => match last_error {
                Some(err) => write!(f, "circuit open; last error: {}", err),
                None => write!(f, "circuit open"),
            },
        }
    }
}

/// Record of a single source attempt during a fetch.
#[derive(Clone, Debug)]
pub struct SourceAttempt {
    pub source: SourceId,
    pub skipped: Option<SkipReason>,
    pub error: Option<String>,
    pub success: bool,
}

/// Ordered log of every source attempt in one fetch call.
#[derive(Clone, Debug, Default)]
pub struct FetchDiagnostics {
    pub attempts: Vec<SourceAttempt>,
}

impl FetchDiagnostics {
    pub fn new() -> Self {
        Self {
            attempts: Vec::new(),
        }
    }

    pub fn record_skip(&mut self, source: SourceId, reason: SkipReason) {
        self.attempts.push(SourceAttempt {
            source,
            skipped: Some(reason),
            error: None,
            success: false,
        });
    }

    pub fn record_error(&mut self, source: SourceId, error: String) {
        self.attempts.push(SourceAttempt {
            source,
            skipped: None,
            error: Some(error),
            success: false,
        });
    }

    pub fn record_success(&mut self, source: SourceId) {
        self.attempts.push(SourceAttempt {
            source,
            skipped: None,
            error: None,
            success: true,
        });
    }

    /// One-line summary in priority order, for logs and aggregated errors.
    pub fn summary(&self) -> String {
        self.attempts
            .iter()
            .map(|a| {
                if a.success {
                    format!("{}: SUCCESS", a.source)
                } else if let Some(skip) = &a.skipped {
                    format!("{}: SKIPPED ({})", a.source, skip)
                } else if let Some(err) = &a.error {
                    format!("{}: ERROR ({})", a.source, err)
                } else {
                    format!("{}: UNKNOWN", a.source)
                }
            })
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    /// Check if any source succeeded.
    pub fn has_success(&self) -> bool {
        self.attempts.iter().any(|a| a.success)
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use super::*;

    #[test]
    fn test_summary_names_every_source() {
        let mut diag = FetchDiagnostics::new();
        diag.record_skip(
            Cow::Borrowed("COINGECKO"),
            SkipReason::CircuitBreakerOpen {
                last_error: Some("Timeout: COINGECKO".to_string()),
            },
        );
        diag.record_error(Cow::Borrowed("DEXSCREENER"), "HTTP 503".to_string());

        let summary = diag.summary();
        assert!(summary.contains("COINGECKO: SKIPPED (circuit open; last error: Timeout: COINGECKO)"));
        assert!(summary.contains("DEXSCREENER: ERROR (HTTP 503)"));
    }

    #[test]
    fn test_has_success() {
        let mut diag = FetchDiagnostics::new();
        diag.record_error(Cow::Borrowed("COINGECKO"), "boom".to_string());
        assert!(!diag.has_success());

        diag.record_success(Cow::Borrowed("DEXSCREENER"));
        assert!(diag.has_success());
    }
}
