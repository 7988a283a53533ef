//! Retry policy with exponential backoff.

use std::time::Duration;
use talktab_core::config::ValidatorConfig;
use tokio_util::sync::CancellationToken;

/// How many times to attempt an operation and how long to wait in between.
///
/// The delay before attempt `k` (1-based, `k >= 2`) is `base_delay * 2^(k-2)`,
/// so a one-second base gives 1s, 2s, 4s, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy. An attempt count of zero is raised to one.
    pub fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay,
        }
    }

    pub fn from_config(config: &ValidatorConfig) -> Self {
        Self::new(config.retry_attempts, config.base_delay())
    }

    /// Total number of attempts, including the first.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// The pause before the given 1-based attempt. `None` for the first.
    pub fn delay_before(&self, attempt: u32) -> Option<Duration> {
        if attempt < 2 {
            return None;
        }
        let factor = 2u32.checked_pow(attempt - 2).unwrap_or(u32::MAX);
        Some(self.base_delay.saturating_mul(factor))
    }

    /// Waits out the delay before `attempt`, racing it against `cancel`.
    ///
    /// Returns `false` if cancellation won.
    pub async fn pause_before(&self, attempt: u32, cancel: &CancellationToken) -> bool {
        let Some(delay) = self.delay_before(attempt) else {
            return !cancel.is_cancelled();
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ValidatorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[test]
    fn test_delay_schedule_doubles() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1));
        assert_eq!(policy.delay_before(1), None);
        assert_eq!(policy.delay_before(2), Some(Duration::from_secs(1)));
        assert_eq!(policy.delay_before(3), Some(Duration::from_secs(2)));
        assert_eq!(policy.delay_before(4), Some(Duration::from_secs(4)));
        assert_eq!(policy.delay_before(5), Some(Duration::from_secs(8)));
    }

    #[test]
    fn test_zero_attempts_becomes_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).attempts(), 1);
    }

    #[test]
    fn test_large_attempt_saturates() {
        let policy = RetryPolicy::new(100, Duration::from_secs(1));
        assert!(policy.delay_before(80).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_waits_for_delay() {
        let policy = RetryPolicy::new(3, Duration::from_millis(500));
        let cancel = CancellationToken::new();
        let start = Instant::now();
        assert!(policy.pause_before(3, &cancel).await);
        assert_eq!(start.elapsed(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_returns_early_on_cancel() {
        let policy = RetryPolicy::new(3, Duration::from_secs(60));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        assert!(!policy.pause_before(2, &cancel).await);
        assert!(start.elapsed() < Duration::from_secs(60));
    }
}
