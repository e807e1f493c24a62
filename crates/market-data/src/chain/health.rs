//! Per-source health tracking.
//!
//! One [`HealthRecord`] per configured source, mutated only by the chain
//! after each attempt. Status follows the consecutive-failure streak
//! through the configured [`HealthThresholds`]; a single success resets the
//! record completely.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use log::warn;

use crate::errors::truncate_error;
use crate::models::{HealthRecord, HealthThresholds, SourceId};

/// Thread-safe map of per-source health records.
pub struct HealthTracker {
    records: Mutex<HashMap<String, HealthRecord>>,
    thresholds: HealthThresholds,
}

impl HealthTracker {
    /// Create a tracker with a fresh `Ok` record for every configured
    /// source, so health snapshots always cover the whole chain.
    pub fn new(thresholds: HealthThresholds, sources: impl IntoIterator<Item = String>) -> Self {
        let records = sources
            .into_iter()
            .map(|name| (name, HealthRecord::default()))
            .collect();
        Self {
            records: Mutex::new(records),
            thresholds,
        }
    }

    /// Lock the records mutex, recovering from poison if necessary.
    fn lock_records(&self) -> MutexGuard<'_, HashMap<String, HealthRecord>> {
        self.records.lock().unwrap_or_else(|poisoned| {
            warn!("Health tracker mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Reset a source's record to healthy: `Ok`, zero failures, success
    /// stamped now, no error, no re-enable time.
    pub fn record_success(&self, source: &SourceId) {
        let mut records = self.lock_records();
        let record = records.entry(source.to_string()).or_default();
        record.status = crate::models::FeedStatus::Ok;
        record.last_success = Some(Utc::now());
        record.consecutive_failures = 0;
        record.last_error = None;
        record.retry_after = None;
    }

    /// Record a failed attempt, moving the status along the thresholds.
    ///
    /// `retry_after` carries the breaker's next-probe time when the failure
    /// opened (or kept open) the circuit.
    pub fn record_failure(
        &self,
        source: &SourceId,
        error: &str,
        retry_after: Option<DateTime<Utc>>,
    ) {
        let mut records = self.lock_records();
        let record = records.entry(source.to_string()).or_default();
        record.consecutive_failures += 1;
        record.status = self.thresholds.status_for(record.consecutive_failures);
        record.last_error = Some(truncate_error(error));
        record.retry_after = retry_after;
    }

    /// Point-in-time snapshot of every record. No side effects.
    pub fn snapshot(&self) -> HashMap<String, HealthRecord> {
        self.lock_records().clone()
    }

    /// The record for one source, if tracked.
    pub fn get(&self, source: &SourceId) -> Option<HealthRecord> {
        self.lock_records().get(source.as_ref()).cloned()
    }
}
