//! Driver tuning.
//!
//! Defaults follow the TAA3040 datasheet timing: the part needs 1 ms after a
//! software reset and after leaving sleep before it accepts configuration.

use embassy_time::Duration;

/// Bounded retry with exponential backoff for control-bus transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RetryPolicy {
    /// Total tries per transaction, including the first. `0` behaves as `1`.
    pub max_attempts: u8,
    /// Delay before the first retry, in microseconds.
    pub backoff_us: u32,
    /// Upper bound on any single retry delay, in microseconds.
    pub max_backoff_us: u32,
}

impl RetryPolicy {
    /// Never retry.
    pub const NONE: Self = Self {
        max_attempts: 1,
        backoff_us: 0,
        max_backoff_us: 0,
    };

    /// Effective number of tries.
    pub fn attempts(&self) -> u8 {
        self.max_attempts.max(1)
    }

    /// Delay to wait after failed try number `attempt` (1-based).
    ///
    /// `backoff * 2^(attempt-1)`, capped at `max_backoff`.
    pub fn backoff(&self, attempt: u8) -> Duration {
        let exponent = u32::from(attempt.saturating_sub(1)).min(31);
        let scaled = 2u32
            .checked_pow(exponent)
            .and_then(|factor| self.backoff_us.checked_mul(factor))
            .unwrap_or(u32::MAX);
        Duration::from_micros(u64::from(scaled.min(self.max_backoff_us)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_us: 100,
            max_backoff_us: 10_000,
        }
    }
}

/// Timing and retry configuration for [`Taa3040`](crate::Taa3040).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DriverConfig {
    /// Retry policy for every register transaction.
    pub retry: RetryPolicy,
    /// Upper bound on a single I²C transaction, in microseconds.
    pub transaction_timeout_us: u32,
    /// Wait after SW_RESET before the next access, in microseconds.
    pub reset_settle_us: u32,
    /// Wait after leaving sleep before configuring, in microseconds.
    pub wake_settle_us: u32,
}

impl DriverConfig {
    /// Transaction timeout as a [`Duration`].
    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_micros(u64::from(self.transaction_timeout_us))
    }

    /// Reset settle time as a [`Duration`].
    pub fn reset_settle(&self) -> Duration {
        Duration::from_micros(u64::from(self.reset_settle_us))
    }

    /// Wake settle time as a [`Duration`].
    pub fn wake_settle(&self) -> Duration {
        Duration::from_micros(u64::from(self.wake_settle_us))
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            transaction_timeout_us: 10_000,
            reset_settle_us: 1_000,
            wake_settle_us: 1_000,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_then_caps() {
        let policy = RetryPolicy {
            max_attempts: 8,
            backoff_us: 100,
            max_backoff_us: 500,
        };
        assert_eq!(policy.backoff(1), Duration::from_micros(100));
        assert_eq!(policy.backoff(2), Duration::from_micros(200));
        assert_eq!(policy.backoff(3), Duration::from_micros(400));
        assert_eq!(policy.backoff(4), Duration::from_micros(500));
    }

    #[test]
    fn backoff_saturates_on_huge_attempt_numbers() {
        let policy = RetryPolicy {
            max_attempts: u8::MAX,
            backoff_us: u32::MAX,
            max_backoff_us: u32::MAX,
        };
        assert_eq!(policy.backoff(u8::MAX), Duration::from_micros(u64::from(u32::MAX)));
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let policy = RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.attempts(), 1);
    }

    #[test]
    fn defaults_match_datasheet_timing() {
        let config = DriverConfig::default();
        assert_eq!(config.reset_settle(), Duration::from_millis(1));
        assert_eq!(config.wake_settle(), Duration::from_millis(1));
        assert_eq!(config.transaction_timeout(), Duration::from_millis(10));
        assert_eq!(config.retry.attempts(), 3);
    }
}
