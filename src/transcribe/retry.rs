//! Retry budget and backoff for transcription requests.

use crate::error::PodscribeError;
use std::time::Duration;

/// Bounded retries with linearly growing delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// `max_attempts` counts the first try; zero is treated as one.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Pause before the retry that follows failed attempt `attempt` (1-based).
    ///
    /// Attempt 1 waits `base`, attempt 2 waits `2 * base`, and so on.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt.max(1))
    }

    /// Whether another attempt should follow failed attempt `attempt`.
    pub fn should_retry(&self, attempt: u32, error: &PodscribeError) -> bool {
        attempt < self.max_attempts && error.is_retryable()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            crate::defaults::MAX_ATTEMPTS,
            Duration::from_millis(crate::defaults::RETRY_BASE_DELAY_MS),
        )
    }
}
