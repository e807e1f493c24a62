use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::quote::FeedStatus;

/// Consecutive-failure counts at which a source's status degrades.
///
/// The mapping is monotonic: a longer failure streak never improves the
/// status. Counts of 0 or 1 stay `Ok`, `degraded_after` and above report
/// `Degraded`, `down_after` and above report `Down`.
#[derive(Clone, Copy, Debug)]
pub struct HealthThresholds {
    /// Consecutive failures at which the status becomes `Degraded`.
    pub degraded_after: u32,
    /// Consecutive failures at which the status becomes `Down`.
    pub down_after: u32,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            degraded_after: 2,
            down_after: 5,
        }
    }
}

impl HealthThresholds {
    /// Status implied by a consecutive-failure count.
    pub fn status_for(&self, consecutive_failures: u32) -> FeedStatus {
        if consecutive_failures >= self.down_after {
            FeedStatus::Down
        } else if consecutive_failures >= self.degraded_after {
            FeedStatus::Degraded
        } else {
            FeedStatus::Ok
        }
    }
}

/// Per-source health snapshot, mutated only by the fallback chain after
/// each attempt.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthRecord {
    /// Current status derived from the failure streak.
    pub status: FeedStatus,

    /// Last time this source returned a valid value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_success: Option<DateTime<Utc>>,

    /// Length of the current failure streak.
    pub consecutive_failures: u32,

    /// Most recent error message (truncated).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    /// When the source's circuit breaker will next allow a probe, if it is
    /// currently open.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<DateTime<Utc>>,
}

impl Default for HealthRecord {
    fn default() -> Self {
        Self {
            status: FeedStatus::Ok,
            last_success: None,
            consecutive_failures: 0,
            last_error: None,
            retry_after: None,
        }
    }
}
