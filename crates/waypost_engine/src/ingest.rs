//! Rate-limited visit ingestion.

use crate::error::EngineResult;
use crate::ratelimit::RateLimiter;
use crate::store::{read_visit_queue, KeyValueStore, VISIT_QUEUE_KEY};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use waypost_protocol::Visit;

/// Appends visits to the persisted queue, suppressing duplicates.
///
/// The rate limiter gates on the visit URL, so rapid revisits of the
/// same page inside the window enqueue nothing. The append is a
/// read-modify-write with no compare-and-swap: a visit recorded while
/// the sync manager is draining can land between its read and its
/// remove and be lost with the drained batch. The store contract has
/// no primitive to close that window; the behavior is accepted.
pub struct VisitRecorder<S: KeyValueStore> {
    store: Arc<S>,
    limiter: Arc<RateLimiter>,
}

impl<S: KeyValueStore> VisitRecorder<S> {
    /// Creates a recorder over the given store and limiter.
    pub fn new(store: Arc<S>, limiter: Arc<RateLimiter>) -> Self {
        Self { store, limiter }
    }

    /// Queues a visit unless its URL was accepted within the window.
    ///
    /// Returns whether the visit was queued. Store failures propagate;
    /// a rejected visit is not an error.
    pub async fn record(&self, visit: Visit) -> EngineResult<bool> {
        if !self.limiter.can_add(&visit.url) {
            debug!("rate limited: {}", visit.url);
            return Ok(false);
        }

        let mut queue = read_visit_queue(self.store.as_ref()).await?;
        queue.push(visit);
        let entries = HashMap::from([(
            VISIT_QUEUE_KEY.to_string(),
            serde_json::to_value(&queue)?,
        )]);
        self.store.set(entries).await?;
        Ok(true)
    }
}
