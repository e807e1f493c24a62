//! Per-source circuit breaker for fault tolerance.
//!
//! Implements the circuit breaker pattern to prevent repeated calls to a
//! source that is currently failing. The observable circuit has three
//! states:
//!
//! - **Closed**: Normal operation, requests are allowed through.
//! - **Open**: Source is failing, requests are short-circuited.
//! - **HalfOpen**: Cooldown has elapsed, a single probe is allowed.
//!
//! Only `Closed` and `Open` are ever stored. `HalfOpen` is computed at read
//! time from the stored state, the last failure time, and the cooldown, so
//! no timer or scheduler is needed and polling [`CircuitBreaker::state`] is
//! side-effect free and idempotent. The stored state is only flipped by
//! [`record_success`](CircuitBreaker::record_success) and
//! [`record_failure`](CircuitBreaker::record_failure).
//!
//! The circuit breaker is in-memory and resets on application restart.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::errors::truncate_error;
use crate::models::SourceId;

/// Default number of consecutive failures before opening the circuit.
const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Default cooldown before an open circuit allows a probe.
const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

/// Observable circuit state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CircuitState {
    /// Normal operation - requests are allowed.
    Closed,
    /// Source is failing - requests are short-circuited.
    Open,
    /// Cooldown elapsed - the next request is attempted as a probe.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "CLOSED"),
            Self::Open => write!(f, "OPEN"),
            Self::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// The two states that are physically stored.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum StoredState {
    Closed,
    Open,
}

/// Internal circuit record for a single source.
#[derive(Debug)]
struct Circuit {
    stored: StoredState,
    /// Number of consecutive failures.
    failure_count: u32,
    /// Time of the last failure (starts the cooldown clock).
    last_failure: Option<Instant>,
    /// Most recent failure message (truncated).
    last_error: Option<String>,
}

impl Circuit {
    fn new() -> Self {
        Self {
            stored: StoredState::Closed,
            failure_count: 0,
            last_failure: None,
            last_error: None,
        }
    }

    /// Pure read-time view of the circuit state.
    fn observed(&self, cooldown: Duration) -> CircuitState {
        match self.stored {
            StoredState::Closed => CircuitState::Closed,
            StoredState::Open => match self.last_failure {
                Some(last) if last.elapsed() >= cooldown => CircuitState::HalfOpen,
                _ => CircuitState::Open,
            },
        }
    }
}

/// Circuit breaker configuration.
#[derive(Clone, Debug)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit.
    pub failure_threshold: u32,
    /// Time to wait after the last failure before allowing a probe.
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            cooldown: DEFAULT_COOLDOWN,
        }
    }
}

/// Per-source circuit breaker.
///
/// Thread-safe breaker that tracks failures per source and short-circuits
/// requests to failing sources. One instance is owned by each fallback
/// chain; circuits are created on first use and live for the chain's
/// lifetime.
pub struct CircuitBreaker {
    /// Per-source circuit records.
    circuits: Mutex<HashMap<String, Circuit>>,
    /// Configuration.
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with default settings.
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    /// Create a circuit breaker with custom configuration.
    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self {
            circuits: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// The configuration this breaker was built with.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Lock the circuits mutex, recovering from poison if necessary.
    ///
    /// The worst case after recovery is a slightly stale circuit record,
    /// which is preferable to panicking.
    fn lock_circuits(&self) -> MutexGuard<'_, HashMap<String, Circuit>> {
        self.circuits.lock().unwrap_or_else(|poisoned| {
            warn!("Circuit breaker mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// The observable state for a source.
    ///
    /// An `Open` circuit whose cooldown has elapsed reads as `HalfOpen`
    /// without any stored mutation; the next recorded outcome decides
    /// whether it closes or re-opens.
    pub fn state(&self, source: &SourceId) -> CircuitState {
        let circuits = self.lock_circuits();
        circuits
            .get(source.as_ref())
            .map(|c| c.observed(self.config.cooldown))
            .unwrap_or(CircuitState::Closed)
    }

    /// True iff the observable state is `Open` (not `HalfOpen`).
    pub fn is_open(&self, source: &SourceId) -> bool {
        self.state(source) == CircuitState::Open
    }

    /// Record a successful call for a source.
    ///
    /// Resets the failure streak, clears the stored error, and closes the
    /// circuit. Always succeeds.
    pub fn record_success(&self, source: &SourceId) {
        let mut circuits = self.lock_circuits();
        let circuit = circuits
            .entry(source.to_string())
            .or_insert_with(Circuit::new);

        if circuit.stored == StoredState::Open {
            info!("Circuit breaker: closing circuit for '{}' after successful probe", source);
        } else if circuit.failure_count > 0 {
            debug!("Circuit breaker: success for '{}', failure count reset", source);
        }

        circuit.stored = StoredState::Closed;
        circuit.failure_count = 0;
        circuit.last_failure = None;
        circuit.last_error = None;
    }

    /// Record a failed call for a source.
    ///
    /// Increments the failure streak, stores a truncated error message and
    /// the failure time, and opens the circuit once the streak reaches the
    /// threshold. A failure while the circuit reads `HalfOpen` restarts the
    /// cooldown clock. Always succeeds.
    pub fn record_failure(&self, source: &SourceId, error: &str) {
        let mut circuits = self.lock_circuits();
        let circuit = circuits
            .entry(source.to_string())
            .or_insert_with(Circuit::new);

        circuit.failure_count += 1;
        circuit.last_failure = Some(Instant::now());
        circuit.last_error = Some(truncate_error(error));

        match circuit.stored {
            StoredState::Closed => {
                if circuit.failure_count >= self.config.failure_threshold {
                    info!(
                        "Circuit breaker: opening circuit for '{}' after {} failures",
                        source, circuit.failure_count
                    );
                    circuit.stored = StoredState::Open;
                } else {
                    debug!(
                        "Circuit breaker: failure for '{}' ({}/{})",
                        source, circuit.failure_count, self.config.failure_threshold
                    );
                }
            }
            StoredState::Open => {
                // A failed probe; updating last_failure restarted the cooldown.
                debug!(
                    "Circuit breaker: probe failed for '{}', cooldown restarted",
                    source
                );
            }
        }
    }

    /// The consecutive-failure count for a source.
    pub fn failure_count(&self, source: &SourceId) -> u32 {
        let circuits = self.lock_circuits();
        circuits
            .get(source.as_ref())
            .map(|c| c.failure_count)
            .unwrap_or(0)
    }

    /// The most recent failure message for a source.
    pub fn last_error(&self, source: &SourceId) -> Option<String> {
        let circuits = self.lock_circuits();
        circuits
            .get(source.as_ref())
            .and_then(|c| c.last_error.clone())
    }

    /// Force a source's circuit back to `Closed` with zero failures.
    /// Used for tests and manual recovery.
    pub fn reset(&self, source: &SourceId) {
        let mut circuits = self.lock_circuits();
        if let Some(circuit) = circuits.get_mut(source.as_ref()) {
            info!("Circuit breaker: manually resetting circuit for '{}'", source);
            circuit.stored = StoredState::Closed;
            circuit.failure_count = 0;
            circuit.last_failure = None;
            circuit.last_error = None;
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    fn breaker(threshold: u32, cooldown: Duration) -> CircuitBreaker {
        CircuitBreaker::with_config(CircuitBreakerConfig {
            failure_threshold: threshold,
            cooldown,
        })
    }

    #[test]
    fn test_circuit_starts_closed() {
        let cb = CircuitBreaker::new();
        let source: SourceId = Cow::Borrowed("TEST_SOURCE");

        assert!(!cb.is_open(&source));
        assert_eq!(cb.state(&source), CircuitState::Closed);
    }

    #[test]
    fn test_circuit_opens_after_threshold() {
        let cb = breaker(3, Duration::from_secs(60));
        let source: SourceId = Cow::Borrowed("FAILING_SOURCE");

        // First two failures don't open the circuit
        cb.record_failure(&source, "boom");
        cb.record_failure(&source, "boom");
        assert_eq!(cb.state(&source), CircuitState::Closed);

        // Third failure opens it
        cb.record_failure(&source, "boom");
        assert!(cb.is_open(&source));
        assert_eq!(cb.state(&source), CircuitState::Open);
    }

    #[test]
    fn test_success_resets_failure_count() {
        let cb = breaker(3, Duration::from_secs(60));
        let source: SourceId = Cow::Borrowed("INTERMITTENT_SOURCE");

        cb.record_failure(&source, "boom");
        cb.record_failure(&source, "boom");
        assert_eq!(cb.failure_count(&source), 2);

        cb.record_success(&source);
        assert_eq!(cb.failure_count(&source), 0);
        assert!(cb.last_error(&source).is_none());
    }

    #[test]
    fn test_half_open_is_derived_after_cooldown() {
        let cb = breaker(1, Duration::from_millis(10));
        let source: SourceId = Cow::Borrowed("RECOVERING_SOURCE");

        cb.record_failure(&source, "boom");
        assert_eq!(cb.state(&source), CircuitState::Open);
        assert!(cb.is_open(&source));

        std::thread::sleep(Duration::from_millis(20));

        // Observed state changes to HalfOpen purely by reading
        assert_eq!(cb.state(&source), CircuitState::HalfOpen);
        assert!(!cb.is_open(&source));
        // Reading again is idempotent
        assert_eq!(cb.state(&source), CircuitState::HalfOpen);
    }

    #[test]
    fn test_success_closes_from_half_open() {
        let cb = breaker(1, Duration::from_millis(10));
        let source: SourceId = Cow::Borrowed("HEALING_SOURCE");

        cb.record_failure(&source, "boom");
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cb.state(&source), CircuitState::HalfOpen);

        cb.record_success(&source);
        assert_eq!(cb.state(&source), CircuitState::Closed);
        assert_eq!(cb.failure_count(&source), 0);
    }

    #[test]
    fn test_failure_while_half_open_restarts_cooldown() {
        let cb = breaker(1, Duration::from_millis(50));
        let source: SourceId = Cow::Borrowed("RELAPSING_SOURCE");

        cb.record_failure(&source, "first");
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(cb.state(&source), CircuitState::HalfOpen);

        // Probe fails: circuit reads Open again for a full cooldown
        cb.record_failure(&source, "second");
        assert_eq!(cb.state(&source), CircuitState::Open);
        assert_eq!(cb.last_error(&source).as_deref(), Some("second"));
    }

    #[test]
    fn test_manual_reset() {
        let cb = breaker(1, Duration::from_secs(60));
        let source: SourceId = Cow::Borrowed("RESET_SOURCE");

        cb.record_failure(&source, "boom");
        assert!(cb.is_open(&source));

        cb.reset(&source);
        assert_eq!(cb.state(&source), CircuitState::Closed);
        assert_eq!(cb.failure_count(&source), 0);
    }

    #[test]
    fn test_source_isolation() {
        let cb = breaker(1, Duration::from_secs(60));
        let source_a: SourceId = Cow::Borrowed("SOURCE_A");
        let source_b: SourceId = Cow::Borrowed("SOURCE_B");

        cb.record_failure(&source_a, "boom");
        assert!(cb.is_open(&source_a));

        // Source B is unaffected
        assert!(!cb.is_open(&source_b));
        assert_eq!(cb.state(&source_b), CircuitState::Closed);
    }

    #[test]
    fn test_long_error_truncated() {
        let cb = breaker(5, Duration::from_secs(60));
        let source: SourceId = Cow::Borrowed("VERBOSE_SOURCE");

        cb.record_failure(&source, &"x".repeat(1000));
        let stored = cb.last_error(&source).unwrap();
        assert!(stored.len() < 1000);
        assert!(stored.ends_with("..."));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(CircuitState::Closed.to_string(), "CLOSED");
        assert_eq!(CircuitState::Open.to_string(), "OPEN");
        assert_eq!(CircuitState::HalfOpen.to_string(), "HALF_OPEN");
    }
}
