//! # Waypost Engine
//!
//! Retry, backoff, and rate-limiting engine for the Waypost sync client.
//!
//! This crate provides:
//! - Sync state machine for the persisted visit queue (drain → submit →
//!   backoff → reschedule)
//! - Exponential backoff with a hard retry ceiling
//! - Bounded linear retry against transient peers
//! - Sliding-window duplicate suppression for the ingestion path
//! - Collaborator traits (store, HTTP, messaging, peer RPC) with
//!   in-crate mocks
//!
//! ## Architecture
//!
//! The engine assumes a **single cooperative thread**: operations
//! suspend only at store reads/writes, HTTP calls, and timer waits, and
//! the sync manager's timer-supersession rule keeps at most one sync
//! scheduled at any time.
//!
//! ## Key invariants
//!
//! - `current_interval` is always a value the backoff calculator could
//!   produce for the current failure count
//! - A sync cycle never surfaces an error; callers poll state or listen
//!   for the `QUEUE_SYNCED` notification
//! - The queue drains as "read all, remove all" with no per-item
//!   acknowledgement
//! - The rate-limit window is half-open: re-acceptance happens exactly
//!   at the window boundary, not after it

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backoff;
mod config;
mod dispatch;
mod error;
mod http;
mod ingest;
mod notify;
mod ratelimit;
mod retry;
mod store;
mod sync;

pub use backoff::BackoffCalculator;
pub use config::{BackoffConfig, RateLimitConfig, RetryPolicy, SyncConfig};
pub use dispatch::{Dispatcher, PeerDescriptor};
pub use error::{EngineError, EngineResult};
pub use http::{CollectorClient, HttpClient, MockHttpClient};
pub use ingest::VisitRecorder;
pub use notify::{Delivery, MessageSink, RecordingSink};
pub use ratelimit::RateLimiter;
pub use retry::{BoundedRetrier, MetricsRetriever, MockPeer, PeerChannel};
pub use store::{
    KeyValueStore, MemoryStore, LAST_METRICS_KEY, LAST_UPDATE_KEY, VISIT_QUEUE_KEY,
};
pub use sync::{SyncManager, SyncStats};
