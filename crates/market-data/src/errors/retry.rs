/// Classification for retry policy.
///
/// Used to determine how the retry executor and the fallback chain should
/// respond to errors from sources.
///
/// # Behavior Summary
///
/// | Class | Retry Same Source? | Try Next Source? |
/// |-------|--------------------|------------------|
/// | `Transient` | Yes (with backoff) | Yes, after retries are exhausted |
/// | `Fatal` | No | Yes |
/// | `CircuitOpen` | No (skip this one) | Yes |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Transient failure: rate limiting, timeout, network hiccup, or a
    /// retryable HTTP status. The retry executor keeps attempting with
    /// exponential backoff until its attempt budget is spent.
    Transient,

    /// Terminal for this source in this call: unknown symbol, unsupported
    /// key, invalid data. Repeating the same request cannot help, so the
    /// chain moves on to the next source immediately.
    Fatal,

    /// The circuit breaker is open for this source.
    /// Skip this source until the circuit closes.
    CircuitOpen,
}
