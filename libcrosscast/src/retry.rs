//! Retry and backoff policy shared by platform clients.
//!
//! The policy is pure arithmetic; the actual sleeping happens in the HTTP
//! layer so this stays trivially testable.

use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// Retries after the initial attempt. Total attempts = max_retries + 1.
    pub max_retries: u32,
    /// Base of the exponential schedule, in seconds.
    pub backoff_factor: f64,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_factor: 2.0,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl BackoffPolicy {
    pub fn new(max_retries: u32, backoff_factor: f64, request_timeout: Duration) -> Self {
        Self {
            max_retries,
            backoff_factor,
            request_timeout,
        }
    }

    /// Total number of attempts this policy allows.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Exponential delay before retrying after `attempt` (0-based) failed.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        Duration::from_secs_f64(self.backoff_factor.powi(attempt as i32))
    }

    /// How long to wait after a rate-limit response.
    ///
    /// Precedence: the platform's `Retry-After` value, then its reset
    /// timestamp relative to `now` (clamped at zero for resets already in
    /// the past), then the exponential schedule.
    pub fn rate_limit_wait(
        &self,
        retry_after_secs: Option<u64>,
        reset_epoch: Option<i64>,
        now_epoch: i64,
        attempt: u32,
    ) -> Duration {
        if let Some(secs) = retry_after_secs {
            return Duration::from_secs(secs);
        }
        if let Some(reset) = reset_epoch {
            return Duration::from_secs(reset.saturating_sub(now_epoch).max(0) as u64);
        }
        self.delay_for_attempt(attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_delay_is_exponential() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(8));
    }

    #[test]
    fn test_delay_monotonic() {
        let policy = BackoffPolicy::new(5, 1.5, Duration::from_secs(10));
        for attempt in 0..5 {
            assert!(policy.delay_for_attempt(attempt + 1) > policy.delay_for_attempt(attempt));
        }
    }

    #[test]
    fn test_rate_limit_wait_prefers_retry_after() {
        let policy = BackoffPolicy::default();
        let wait = policy.rate_limit_wait(Some(17), Some(1_000_100), 1_000_000, 2);
        assert_eq!(wait, Duration::from_secs(17));
    }

    #[test]
    fn test_rate_limit_wait_uses_reset_epoch() {
        let policy = BackoffPolicy::default();
        let wait = policy.rate_limit_wait(None, Some(1_000_090), 1_000_000, 2);
        assert_eq!(wait, Duration::from_secs(90));
    }

    #[test]
    fn test_rate_limit_wait_clamps_past_reset() {
        let policy = BackoffPolicy::default();
        let wait = policy.rate_limit_wait(None, Some(999_000), 1_000_000, 0);
        assert_eq!(wait, Duration::from_secs(0));
    }

    #[test]
    fn test_rate_limit_wait_falls_back_to_exponential() {
        let policy = BackoffPolicy::default();
        let wait = policy.rate_limit_wait(None, None, 1_000_000, 3);
        assert_eq!(wait, Duration::from_secs(8));
    }
}
