//! Outbound retry policy
//!
//! A transmission is one attempt to push a specific message copy over a
//! specific peer link. Failed transmissions are retried with linear
//! backoff (retry n waits n backoff units); once the retry budget is
//! spent the transmission is abandoned and the message is parked in that
//! peer's pending queue, where the ready-transition flush and the health
//! sweep pick it up again.

use std::time::Duration;

/// Retry schedule for failed transmissions.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries allowed per transmission.
    pub max_retries: u32,
    /// Backoff unit; retry n waits `n * unit`.
    pub unit: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, unit: Duration) -> Self {
        Self { max_retries, unit }
    }

    /// Whether another retry is allowed after `retries_done` failures.
    pub fn should_retry(&self, retries_done: u32) -> bool {
        retries_done < self.max_retries
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.unit.saturating_mul(retry)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            unit: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule_is_one_two_three_seconds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(3));
    }

    #[test]
    fn test_retry_budget() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(0));
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        // Three retries spent: abandon the transmission
        assert!(!policy.should_retry(3));
        assert!(!policy.should_retry(4));
    }

    #[test]
    fn test_custom_unit_scales_delays() {
        let policy = RetryPolicy::new(3, Duration::from_millis(25));
        assert_eq!(policy.delay_for(2), Duration::from_millis(50));
        assert_eq!(policy.delay_for(3), Duration::from_millis(75));
    }
}
