//! Retry / Backoff
//!
//! Decides what happens after a failed attempt and how long to wait before
//! the next one.

use super::model::Priority;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cap the exponent so `2^attempt` cannot overflow.
const MAX_EXPONENT: u32 = 30;

/// Priority given to a task when it is re-queued for another attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RetryPriority {
    /// Jump ahead of fresh work
    #[default]
    Urgent,
    /// Keep the task's own priority
    Original,
}

impl RetryPriority {
    #[must_use]
    pub fn apply(self, original: Priority) -> Priority {
        match self {
            RetryPriority::Urgent => Priority::Urgent,
            RetryPriority::Original => original,
        }
    }
}

/// Exponential backoff: `base * 2^attempt`, optionally capped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Option<Duration>,
}

impl BackoffPolicy {
    #[must_use]
    pub const fn new(base: Duration, max: Option<Duration>) -> Self {
        Self { base, max }
    }

    /// Delay before the next attempt, given how many retries already happened
    #[must_use]
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        let factor = 1u32 << retry_count.min(MAX_EXPONENT);
        let delay = self.base.saturating_mul(factor);
        match self.max {
            Some(max) => delay.min(max),
            None => delay,
        }
    }
}

/// Outcome of a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-queue after `delay` as attempt number `retry_count`
    Retry {
        delay: Duration,
        retry_count: u32,
        priority: Priority,
    },
    /// Retries exhausted
    GiveUp,
}

/// Decide whether a task that just failed gets another attempt
#[must_use]
pub fn decide(
    retry_count: u32,
    max_retries: u32,
    original: Priority,
    backoff: &BackoffPolicy,
    promotion: RetryPriority,
) -> RetryDecision {
    if retry_count >= max_retries {
        return RetryDecision::GiveUp;
    }
    RetryDecision::Retry {
        delay: backoff.delay_for(retry_count),
        retry_count: retry_count + 1,
        priority: promotion.apply(original),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_delay() {
        let policy = BackoffPolicy::new(Duration::from_millis(100), None);
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(800));
    }

    #[test]
    fn test_delay_cap() {
        let policy = BackoffPolicy::new(
            Duration::from_millis(100),
            Some(Duration::from_millis(250)),
        );
        assert_eq!(policy.delay_for(2), Duration::from_millis(250));
    }

    #[test]
    fn test_huge_attempt_does_not_overflow() {
        let policy = BackoffPolicy::new(Duration::from_secs(1), None);
        assert!(policy.delay_for(u32::MAX) >= Duration::from_secs(1 << 30));
    }

    #[test]
    fn test_decide_retry_then_give_up() {
        let policy = BackoffPolicy::new(Duration::from_millis(10), None);

        let first = decide(0, 2, Priority::Low, &policy, RetryPriority::Urgent);
        assert_eq!(
            first,
            RetryDecision::Retry {
                delay: Duration::from_millis(10),
                retry_count: 1,
                priority: Priority::Urgent,
            }
        );

        let second = decide(1, 2, Priority::Low, &policy, RetryPriority::Original);
        assert!(matches!(
            second,
            RetryDecision::Retry { retry_count: 2, priority: Priority::Low, .. }
        ));

        assert_eq!(
            decide(2, 2, Priority::Low, &policy, RetryPriority::Urgent),
            RetryDecision::GiveUp
        );
    }
}
