//! Last-known-good cache for fetched values.
//!
//! Remembers the most recent successful value per key, bounded by an age
//! limit. Consulted only after every live source has failed or been
//! skipped; a fresh entry is served as a degraded substitute instead of
//! surfacing an error.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::models::{FeedKey, PriceQuote};

/// Default maximum age before an entry stops being served.
const DEFAULT_MAX_AGE: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
struct CacheEntry {
    quote: PriceQuote,
    stored_at: Instant,
}

/// Keyed, time-bounded memory of the most recent successful value per key.
///
/// Stale entries are not proactively evicted; they are ignored by
/// [`get`](Self::get) until overwritten. Since time only moves forward, a
/// stale entry is dead until replaced.
pub struct LastKnownGoodCache {
    entries: Mutex<HashMap<FeedKey, CacheEntry>>,
    max_age: Duration,
}

impl LastKnownGoodCache {
    /// Create a cache with the default age limit.
    pub fn new() -> Self {
        Self::with_max_age(DEFAULT_MAX_AGE)
    }

    /// Create a cache with a custom age limit.
    pub fn with_max_age(max_age: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_age,
        }
    }

    /// Lock the entries mutex, recovering from poison if necessary.
    fn lock_entries(&self) -> MutexGuard<'_, HashMap<FeedKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            warn!("Last-known-good cache mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Unconditionally overwrite the entry for `key` with `quote` and the
    /// current time.
    pub fn put(&self, key: &FeedKey, quote: PriceQuote) {
        let mut entries = self.lock_entries();
        entries.insert(
            key.clone(),
            CacheEntry {
                quote,
                stored_at: Instant::now(),
            },
        );
    }

    /// The stored value for `key`, only if its age is within the limit.
    ///
    /// Never returns a value older than `max_age`, regardless of how many
    /// keys are tracked or how long the process has run.
    pub fn get(&self, key: &FeedKey) -> Option<PriceQuote> {
        let entries = self.lock_entries();
        let entry = entries.get(key)?;
        let age = entry.stored_at.elapsed();
        if age > self.max_age {
            debug!(
                "Last-known-good entry for '{}' is stale ({:?} > {:?})",
                key, age, self.max_age
            );
            return None;
        }
        Some(entry.quote.clone())
    }

    /// Number of tracked keys, fresh or stale.
    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    /// True when no key has ever been stored.
    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }
}

impl Default for LastKnownGoodCache {
    fn default() -> Self {
        Self::new()
    }
}
