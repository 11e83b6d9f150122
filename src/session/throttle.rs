//! Backoff between consecutive failed unlock attempts.

use std::time::Duration;

/// Attempts allowed before any delay applies
const FREE_ATTEMPTS: u32 = 3;

/// Largest power of two used for the delay, keeps the shift in range
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// Counts consecutive failed unlocks since the last success.
///
/// Before the k-th consecutive attempt, with k > 3, the caller waits
/// 2^(k-2) seconds: 4s before the 4th attempt, 8s before the 5th.
#[derive(Debug, Default, Clone)]
pub struct UnlockThrottle {
    failures: u32,
}

impl UnlockThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Delay to apply before the next attempt
    pub fn delay_before_next(&self) -> Option<Duration> {
        let attempt = self.failures.saturating_add(1);
        if attempt <= FREE_ATTEMPTS {
            return None;
        }
        let exponent = (attempt - 2).min(MAX_BACKOFF_EXPONENT);
        Some(Duration::from_secs(1u64 << exponent))
    }

    pub fn record_failure(&mut self) {
        self.failures = self.failures.saturating_add(1);
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_three_attempts_are_free() {
        let mut throttle = UnlockThrottle::new();
        assert_eq!(throttle.delay_before_next(), None);
        throttle.record_failure();
        assert_eq!(throttle.delay_before_next(), None);
        throttle.record_failure();
        assert_eq!(throttle.delay_before_next(), None);
    }

    #[test]
    fn test_delay_doubles_from_fourth_attempt() {
        let mut throttle = UnlockThrottle::new();
        for _ in 0..3 {
            throttle.record_failure();
        }
        assert_eq!(throttle.delay_before_next(), Some(Duration::from_secs(4)));
        throttle.record_failure();
        assert_eq!(throttle.delay_before_next(), Some(Duration::from_secs(8)));
        throttle.record_failure();
        assert_eq!(throttle.delay_before_next(), Some(Duration::from_secs(16)));
    }

    #[test]
    fn test_delay_is_capped_and_reset_clears() {
        let mut throttle = UnlockThrottle::new();
        for _ in 0..100 {
            throttle.record_failure();
        }
        assert_eq!(
            throttle.delay_before_next(),
            Some(Duration::from_secs(1 << MAX_BACKOFF_EXPONENT))
        );
        throttle.reset();
        assert_eq!(throttle.failures(), 0);
        assert_eq!(throttle.delay_before_next(), None);
    }
}
