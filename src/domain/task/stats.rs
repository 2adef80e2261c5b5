//! Stats & ETA
//!
//! Aggregate counts over the ledger and live structures, and a completion
//! estimate based on the average duration of finished work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Scheduler statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub pending: usize,
    pub running: usize,
    /// Failed tasks waiting out their backoff delay
    pub retrying: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Every task the ledger knows about
    pub total: usize,
}

impl SchedulerStats {
    /// Work that has not settled yet
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.pending + self.running + self.retrying
    }
}

/// Projected completion of all outstanding work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimatedCompletion {
    pub eta: Duration,
    pub eta_date: DateTime<Utc>,
}

/// Estimate how long the outstanding work will take.
///
/// `None` when nothing is outstanding or there is no completed history.
pub fn estimate_completion(
    completed_durations_ms: impl IntoIterator<Item = u64>,
    outstanding: usize,
    max_concurrent: usize,
) -> Option<EstimatedCompletion> {
    if outstanding == 0 {
        return None;
    }

    let (sum, count) = completed_durations_ms
        .into_iter()
        .fold((0u128, 0u128), |(sum, count), ms| (sum + u128::from(ms), count + 1));
    if count == 0 {
        return None;
    }

    // mean * outstanding / parallelism, kept in integer nanoseconds
    let parallelism = max_concurrent.min(outstanding).max(1) as u128;
    let eta_nanos = sum * outstanding as u128 * 1_000_000 / (count * parallelism);

    let eta = Duration::from_nanos(u64::try_from(eta_nanos).unwrap_or(u64::MAX));
    let eta_date = Utc::now()
        + chrono::Duration::from_std(eta).unwrap_or_else(|_| chrono::Duration::zero());

    Some(EstimatedCompletion { eta, eta_date })
}
