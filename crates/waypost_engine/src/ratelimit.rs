//! Sliding-window duplicate suppression.

use crate::config::RateLimitConfig;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Rejects re-acceptance of the same key inside a fixed window.
///
/// The limiter sits upstream of the sync queue: the ingestion path asks
/// `can_add` before enqueuing a visit, so a page reloaded in a tight
/// loop produces one queued visit per window instead of dozens.
///
/// The window is half-open: a key is accepted again once `window` has
/// fully elapsed since its last acceptance (`elapsed >= window`, not
/// `>`). Entries live in memory only and are never persisted; a process
/// restart forgets them.
///
/// `cleanup` is purely a memory bound. `can_add` re-checks elapsed time
/// on every call, so correctness never depends on the sweep having run.
pub struct RateLimiter {
    config: RateLimitConfig,
    last_accepted: Mutex<HashMap<String, Instant>>,
    cleanup_task: Mutex<Option<JoinHandle<()>>>,
}

impl RateLimiter {
    /// Creates a limiter. The periodic cleanup task is not started;
    /// call [`RateLimiter::start_cleanup`] once the limiter is shared.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            last_accepted: Mutex::new(HashMap::new()),
            cleanup_task: Mutex::new(None),
        }
    }

    /// Accepts and records `key` if it has no acceptance inside the
    /// window; rejects without mutating state otherwise.
    pub fn can_add(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut entries = self.last_accepted.lock();

        match entries.get(key) {
            Some(last) if now.duration_since(*last) < self.config.window => false,
            _ => {
                entries.insert(key.to_string(), now);
                true
            }
        }
    }

    /// Removes every key whose last acceptance is at least one window in
    /// the past.
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.last_accepted
            .lock()
            .retain(|_, last| now.duration_since(*last) < self.config.window);
    }

    /// Starts the periodic cleanup task. No-op if one is already
    /// running.
    pub fn start_cleanup(self: &Arc<Self>) {
        let mut task = self.cleanup_task.lock();
        if task.is_some() {
            return;
        }

        let limiter: Weak<Self> = Arc::downgrade(self);
        let interval = self.config.cleanup_interval;
        *task = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                match limiter.upgrade() {
                    Some(limiter) => limiter.cleanup(),
                    None => break,
                }
            }
        }));
    }

    /// Stops the periodic cleanup task. No-op if none is running.
    pub fn stop_cleanup(&self) {
        if let Some(task) = self.cleanup_task.lock().take() {
            task.abort();
        }
    }

    /// Stops cleanup, forgets every recorded key, and restarts cleanup.
    pub fn reset(self: &Arc<Self>) {
        self.stop_cleanup();
        self.last_accepted.lock().clear();
        self.start_cleanup();
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.last_accepted.lock().len()
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        if let Some(task) = self.cleanup_task.lock().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::sleep;

    fn limiter(window_ms: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig::new(Duration::from_millis(window_ms)))
    }

    #[tokio::test(start_paused = true)]
    async fn rejects_duplicate_inside_window() {
        let limiter = limiter(30_000);
        assert!(limiter.can_add("https://example.com"));
        assert!(!limiter.can_add("https://example.com"));
    }

    #[tokio::test(start_paused = true)]
    async fn window_is_half_open() {
        let limiter = limiter(30_000);
        assert!(limiter.can_add("https://example.com"));

        sleep(Duration::from_millis(29_999)).await;
        assert!(!limiter.can_add("https://example.com"));

        sleep(Duration::from_millis(1)).await;
        assert!(limiter.can_add("https://example.com"));
    }

    #[tokio::test(start_paused = true)]
    async fn acceptance_refreshes_the_window() {
        let limiter = limiter(1000);
        assert!(limiter.can_add("k"));
        sleep(Duration::from_millis(1000)).await;
        assert!(limiter.can_add("k"));

        // The second acceptance restarted the clock.
        sleep(Duration::from_millis(500)).await;
        assert!(!limiter.can_add("k"));
    }

    #[tokio::test(start_paused = true)]
    async fn distinct_keys_are_independent() {
        let limiter = limiter(30_000);
        assert!(limiter.can_add("https://a.example"));
        assert!(limiter.can_add("https://b.example"));
        assert!(!limiter.can_add("https://a.example"));
        assert!(!limiter.can_add("https://b.example"));
    }

    #[tokio::test(start_paused = true)]
    async fn cleanup_evicts_only_stale_keys() {
        let limiter = limiter(1000);
        assert!(limiter.can_add("old"));
        sleep(Duration::from_millis(600)).await;
        assert!(limiter.can_add("fresh"));
        sleep(Duration::from_millis(400)).await;

        // "old" is exactly one window out, "fresh" only 400ms.
        limiter.cleanup();
        assert_eq!(limiter.tracked_keys(), 1);
        assert!(!limiter.can_add("fresh"));
        assert!(limiter.can_add("old"));
    }

    #[tokio::test(start_paused = true)]
    async fn rejection_does_not_mutate_state() {
        let limiter = limiter(1000);
        assert!(limiter.can_add("k"));
        sleep(Duration::from_millis(900)).await;
        assert!(!limiter.can_add("k"));

        // The rejected call must not have refreshed the entry.
        sleep(Duration::from_millis(100)).await;
        assert!(limiter.can_add("k"));
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_cleanup_sweeps() {
        let limiter = Arc::new(RateLimiter::new(
            RateLimitConfig::new(Duration::from_millis(500))
                .with_cleanup_interval(Duration::from_millis(1000)),
        ));
        limiter.start_cleanup();
        assert!(limiter.can_add("k"));
        assert_eq!(limiter.tracked_keys(), 1);

        sleep(Duration::from_millis(1100)).await;
        assert_eq!(limiter.tracked_keys(), 0);
        limiter.stop_cleanup();
    }

    #[tokio::test(start_paused = true)]
    async fn start_and_stop_are_idempotent() {
        let limiter = Arc::new(limiter(1000));
        limiter.stop_cleanup();
        limiter.start_cleanup();
        limiter.start_cleanup();
        limiter.stop_cleanup();
        limiter.stop_cleanup();
    }

    #[tokio::test(start_paused = true)]
    async fn reset_clears_and_rearms() {
        let limiter = Arc::new(limiter(30_000));
        limiter.start_cleanup();
        assert!(limiter.can_add("k"));
        assert!(!limiter.can_add("k"));

        limiter.reset();
        assert_eq!(limiter.tracked_keys(), 0);
        assert!(limiter.can_add("k"));
        limiter.stop_cleanup();
    }
}
