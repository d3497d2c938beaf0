//! Persistent key-value store abstraction.

use crate::error::{EngineError, EngineResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;

/// Storage key holding the queued visits (a JSON array of `Visit`).
pub const VISIT_QUEUE_KEY: &str = "visit_queue";

/// Storage key holding the most recent metrics report (glue state).
pub const LAST_METRICS_KEY: &str = "last_metrics";

/// Storage key holding the epoch-ms time of the last metrics update.
pub const LAST_UPDATE_KEY: &str = "last_update";

/// A persistent key-value store.
///
/// Implement this trait to bind the engine to the host's storage area.
/// All calls are independent; there is no transaction spanning a
/// `get` and a later `set`/`remove`, which is why the queue drain can
/// lose a concurrently enqueued visit (see [`crate::sync::SyncManager`]).
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads the given keys. Absent keys are simply missing from the
    /// returned map.
    async fn get(&self, keys: &[&str]) -> EngineResult<HashMap<String, Value>>;

    /// Writes all given entries.
    async fn set(&self, entries: HashMap<String, Value>) -> EngineResult<()>;

    /// Removes the given keys. Removing an absent key is not an error.
    async fn remove(&self, keys: &[&str]) -> EngineResult<()>;
}

/// Reads and decodes the visit queue; an absent key is an empty queue.
pub(crate) async fn read_visit_queue<S: KeyValueStore + ?Sized>(
    store: &S,
) -> EngineResult<Vec<waypost_protocol::Visit>> {
    let mut entries = store.get(&[VISIT_QUEUE_KEY]).await?;
    match entries.remove(VISIT_QUEUE_KEY) {
        Some(value) => Ok(serde_json::from_value(value)?),
        None => Ok(Vec::new()),
    }
}

/// An in-memory store for testing and ephemeral deployments.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Value>>,
    fail_next: RwLock<Option<String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value directly, bypassing the async interface.
    pub fn insert(&self, key: impl Into<String>, value: Value) {
        self.entries.write().insert(key.into(), value);
    }

    /// Reads a value directly.
    pub fn value(&self, key: &str) -> Option<Value> {
        self.entries.read().get(key).cloned()
    }

    /// Returns true if the key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Makes the next store call fail with the given message.
    pub fn fail_next(&self, message: impl Into<String>) {
        *self.fail_next.write() = Some(message.into());
    }

    fn take_failure(&self) -> Option<String> {
        self.fail_next.write().take()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, keys: &[&str]) -> EngineResult<HashMap<String, Value>> {
        if let Some(message) = self.take_failure() {
            return Err(EngineError::Store(message));
        }
        let entries = self.entries.read();
        Ok(keys
            .iter()
            .filter_map(|key| entries.get(*key).map(|v| ((*key).to_string(), v.clone())))
            .collect())
    }

    async fn set(&self, new_entries: HashMap<String, Value>) -> EngineResult<()> {
        if let Some(message) = self.take_failure() {
            return Err(EngineError::Store(message));
        }
        self.entries.write().extend(new_entries);
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> EngineResult<()> {
        if let Some(message) = self.take_failure() {
            return Err(EngineError::Store(message));
        }
        let mut entries = self.entries.write();
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }
}
