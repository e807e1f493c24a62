//! Bounded retry with exponential backoff for a single source call.
//!
//! [`resilient_call`] wraps one logical fetch in a retry loop and does the
//! breaker bookkeeping for the whole sequence: the breaker sees only the
//! terminal outcome, never the individual attempts. A source that fails
//! twice and then succeeds on the third attempt is recorded as one success.

use std::future::Future;
use std::time::Duration;

use log::{debug, warn};

use crate::errors::{FeedError, RetryClass};
use crate::models::SourceId;

use super::circuit_breaker::CircuitBreaker;

/// Immutable retry configuration, shared across calls.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Total attempts per call, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Upper bound on any single inter-attempt delay.
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each attempt.
    pub backoff_multiplier: f64,
    /// HTTP status codes worth retrying (for HTTP-shaped sources).
    pub retryable_status: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            retryable_status: vec![429, 500, 502, 503, 504],
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following `completed_attempts`:
    /// `min(base_delay * multiplier^(completed_attempts - 1), max_delay)`.
    pub fn backoff_delay(&self, completed_attempts: u32) -> Duration {
        let exponent = completed_attempts.saturating_sub(1).min(31) as i32;
        let factor = self.backoff_multiplier.powi(exponent);
        let raw = self.base_delay.as_secs_f64() * factor;
        Duration::from_secs_f64(raw.min(self.max_delay.as_secs_f64()))
    }

    /// Whether an HTTP status is in the retryable set.
    pub fn retries_status(&self, status: u16) -> bool {
        self.retryable_status.contains(&status)
    }

    /// Whether an error is worth another attempt against the same source.
    fn should_retry(&self, error: &FeedError) -> bool {
        match error.retry_class() {
            RetryClass::Transient => match error.status_code() {
                Some(status) => self.retries_status(status),
                None => true,
            },
            RetryClass::Fatal | RetryClass::CircuitOpen => false,
        }
    }
}

/// Execute one fetch with bounded retries, coordinating with a breaker.
///
/// If a breaker is supplied and reads open for `source`, the call fails
/// immediately with [`FeedError::CircuitOpen`] naming the breaker's last
/// recorded error - no attempt is made and no retry budget is consumed.
///
/// Otherwise `op` is attempted up to `policy.max_attempts` times, sleeping
/// the policy's backoff delay between attempts. Errors that are terminal for
/// this source (unknown symbol, unsupported key) abort the loop early since
/// repeating the request cannot help.
///
/// On success the breaker records exactly one success; on a terminal
/// failure it records exactly one failure and the last error propagates.
pub async fn resilient_call<T, F, Fut>(
    source: &SourceId,
    policy: &RetryPolicy,
    breaker: Option<&CircuitBreaker>,
    op: F,
) -> Result<T, FeedError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, FeedError>>,
{
    if let Some(breaker) = breaker {
        if breaker.is_open(source) {
            let last_error = breaker
                .last_error(source)
                .unwrap_or_else(|| "unknown".to_string());
            debug!("'{}': circuit open, call short-circuited", source);
            return Err(FeedError::CircuitOpen {
                src: source.to_string(),
                last_error,
            });
        }
    }

    let mut last_error: Option<FeedError> = None;

    for attempt in 1..=policy.max_attempts.max(1) {
        match op().await {
            Ok(value) => {
                if let Some(breaker) = breaker {
                    breaker.record_success(source);
                }
                if attempt > 1 {
                    debug!("'{}': succeeded on attempt {}", source, attempt);
                }
                return Ok(value);
            }
            Err(error) => {
                let retryable = policy.should_retry(&error);
                warn!(
                    "'{}': attempt {}/{} failed: {}",
                    source, attempt, policy.max_attempts, error
                );
                last_error = Some(error);

                if !retryable {
                    break;
                }
                if attempt < policy.max_attempts {
                    let delay = policy.backoff_delay(attempt);
                    debug!("'{}': backing off {:?} before retry", source, delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    // Exhausted or aborted: the breaker sees a single terminal failure.
    let error = last_error.unwrap_or_else(|| FeedError::SourceError {
        src: source.to_string(),
        message: "no attempts were made".to_string(),
    });
    if let Some(breaker) = breaker {
        breaker.record_failure(source, &error.to_string());
    }
    Err(error)
}
