use std::time::Duration;

/// Default base delay before the first retry of a candidate.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(2000);

/// Default upper bound of the random jitter added to each delay.
pub const DEFAULT_MAX_JITTER: Duration = Duration::from_millis(1000);

/// Exponential backoff with additive uniform jitter.
///
/// The delay after the `n`th failed attempt (1-based) is
/// `base * 2^(n-1) + U[0, max_jitter)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub max_jitter: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }
}

impl BackoffPolicy {
    pub fn new(base_delay: Duration, max_jitter: Duration) -> Self {
        Self {
            base_delay,
            max_jitter,
        }
    }

    /// No waiting at all; used by tests and local tooling.
    pub fn immediate() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Deterministic part of the delay after `attempt` failures.
    pub fn exponential_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// Full delay after `attempt` failures, jitter included.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let jitter = self.max_jitter.mul_f64(rand::random::<f64>());
        self.exponential_delay(attempt).saturating_add(jitter)
    }
}
