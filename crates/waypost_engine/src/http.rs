//! HTTP client abstraction and the collector endpoint wrapper.

use crate::error::{EngineError, EngineResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport (reqwest,
/// hyper, a host-provided fetch, ...). The engine only ever POSTs JSON.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends a POST request with a JSON body and returns the parsed
    /// response body.
    ///
    /// Implementations must treat a non-2xx status, a connection
    /// failure, and an elapsed `timeout` all as errors.
    async fn post_json(&self, url: &str, body: &Value, timeout: Duration) -> EngineResult<Value>;
}

#[async_trait]
impl<T: HttpClient + ?Sized> HttpClient for std::sync::Arc<T> {
    async fn post_json(&self, url: &str, body: &Value, timeout: Duration) -> EngineResult<Value> {
        (**self).post_json(url, body, timeout).await
    }
}

/// The collector endpoint, layered over an [`HttpClient`].
///
/// Knows the batch route and the payload shape; everything above it
/// deals in typed records.
pub struct CollectorClient<C: HttpClient> {
    base_url: String,
    timeout: Duration,
    client: C,
}

impl<C: HttpClient> CollectorClient<C> {
    /// Creates a collector client rooted at `base_url`.
    pub fn new(base_url: impl Into<String>, timeout: Duration, client: C) -> Self {
        Self {
            base_url: base_url.into(),
            timeout,
            client,
        }
    }

    /// Returns the configured base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submits one batch of wire records to the collector.
    ///
    /// The whole batch succeeds or fails as a unit; there is no
    /// per-record acknowledgement in the collector API.
    pub async fn submit_batch<T: serde::Serialize>(&self, records: &[T]) -> EngineResult<()> {
        let body = serde_json::to_value(records)?;
        let url = format!("{}/visits/batch", self.base_url);
        self.client.post_json(&url, &body, self.timeout).await?;
        Ok(())
    }
}

/// A scripted HTTP client for testing.
#[derive(Debug, Default)]
pub struct MockHttpClient {
    calls: Mutex<Vec<(String, Value)>>,
    failures_remaining: AtomicU32,
}

impl MockHttpClient {
    /// Creates a client that accepts every request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` requests fail with a retryable transport
    /// error.
    pub fn fail_times(&self, count: u32) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Returns the recorded `(url, body)` pairs, including failed calls.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().clone()
    }

    /// Number of requests seen so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn post_json(&self, url: &str, body: &Value, _timeout: Duration) -> EngineResult<Value> {
        self.calls.lock().push((url.to_string(), body.clone()));

        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(EngineError::transport_retryable("connection refused"));
        }
        Ok(Value::Null)
    }
}
