//! Exponential backoff calculation.

use crate::config::BackoffConfig;
use std::time::Duration;

/// Computes retry intervals for the sync manager.
///
/// The interval after `failure_count` consecutive failures is
/// `base_interval * 2^failure_count`, capped at `max_interval`. The
/// calculator is pure: it holds no mutable state and the same input
/// always produces the same interval.
#[derive(Debug, Clone)]
pub struct BackoffCalculator {
    config: BackoffConfig,
}

impl BackoffCalculator {
    /// Creates a calculator from the given configuration.
    pub fn new(config: BackoffConfig) -> Self {
        Self { config }
    }

    /// Returns the interval to wait after `failure_count` consecutive
    /// failures.
    ///
    /// Saturates rather than overflowing: once `2^failure_count` leaves
    /// `u32` range the result is already far beyond any sensible cap, so
    /// the factor pins to `u32::MAX` and the cap takes over.
    pub fn calculate_interval(&self, failure_count: u32) -> Duration {
        let factor = 2u32.checked_pow(failure_count).unwrap_or(u32::MAX);
        self.config
            .base_interval
            .saturating_mul(factor)
            .min(self.config.max_interval)
    }

    /// Returns true while automatic retries are still allowed.
    pub fn should_retry(&self, failure_count: u32) -> bool {
        failure_count < self.config.max_retries
    }

    /// Returns the configured retry ceiling.
    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }
}
