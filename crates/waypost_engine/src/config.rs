//! Configuration for the engine.

use std::time::Duration;

/// Configuration for the sync manager.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the collector API (e.g. `http://localhost:8000/api/v1`).
    pub api_base_url: String,
    /// Timeout applied to each batch submission.
    pub api_timeout: Duration,
    /// Deployment-mode flag: when set, failed sync cycles emit
    /// diagnostics distinguishing "will retry" from "exhausted".
    pub dev_mode: bool,
}

impl SyncConfig {
    /// Creates a sync configuration for the given collector.
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            api_timeout: Duration::from_secs(10),
            dev_mode: false,
        }
    }

    /// Sets the batch submission timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.api_timeout = timeout;
        self
    }

    /// Enables failure diagnostics.
    pub fn with_dev_mode(mut self, dev_mode: bool) -> Self {
        self.dev_mode = dev_mode;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new("http://localhost:8000/api/v1")
    }
}

/// Configuration for exponential sync backoff.
///
/// Invariant: `base_interval <= max_interval`. The calculator clamps at
/// `max_interval` either way, so a violated invariant degenerates to a
/// constant interval rather than misbehaving.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Interval after zero failures.
    pub base_interval: Duration,
    /// Ceiling for the computed interval.
    pub max_interval: Duration,
    /// Number of consecutive failures after which automatic attempts
    /// are suppressed. Must be at least 1.
    pub max_retries: u32,
}

impl BackoffConfig {
    /// Creates a backoff configuration.
    pub fn new(base_interval: Duration, max_interval: Duration, max_retries: u32) -> Self {
        Self {
            base_interval,
            max_interval,
            max_retries,
        }
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_secs(10),
            max_interval: Duration::from_secs(300),
            max_retries: 5,
        }
    }
}

/// Retry policy for peer RPC, with linearly growing delays.
///
/// Deliberately distinct from [`BackoffConfig`]: a peer that has not
/// attached yet usually does so within a second or two, which does not
/// warrant exponential growth.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts. Must be at least 1.
    pub max_retries: u32,
    /// Delay before attempt `k + 1` is `base_delay * k`.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Creates a retry policy.
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            base_delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(300),
        }
    }
}

/// Configuration for the duplicate-suppression rate limiter.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Minimum time that must elapse before the same key is accepted
    /// again.
    pub window: Duration,
    /// How often the cleanup task sweeps expired keys.
    pub cleanup_interval: Duration,
}

impl RateLimitConfig {
    /// Creates a rate-limit configuration with the given window.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            cleanup_interval: Duration::from_secs(60),
        }
    }

    /// Sets the cleanup sweep interval.
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_config_builder() {
        let config = SyncConfig::new("https://collector.example.com/api/v1")
            .with_timeout(Duration::from_secs(60))
            .with_dev_mode(true);

        assert_eq!(config.api_base_url, "https://collector.example.com/api/v1");
        assert_eq!(config.api_timeout, Duration::from_secs(60));
        assert!(config.dev_mode);
    }

    #[test]
    fn retry_policy_floor() {
        let policy = RetryPolicy::new(0, Duration::from_millis(100));
        assert_eq!(policy.max_retries, 1);
    }

    #[test]
    fn defaults() {
        let backoff = BackoffConfig::default();
        assert_eq!(backoff.base_interval, Duration::from_secs(10));
        assert_eq!(backoff.max_interval, Duration::from_secs(300));
        assert_eq!(backoff.max_retries, 5);

        let rate = RateLimitConfig::default();
        assert_eq!(rate.window, Duration::from_secs(30));
        assert_eq!(rate.cleanup_interval, Duration::from_secs(60));
    }
}
