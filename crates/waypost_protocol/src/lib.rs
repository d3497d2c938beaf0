//! # Waypost Protocol
//!
//! Record and message types for the Waypost sync client.
//!
//! This crate provides:
//! - `Visit` / `VisitRecord` for queued page visits (persisted vs. wire form)
//! - `PageMetrics` for live per-peer metrics reports
//! - `RuntimeMessage` for the host runtime messaging channel
//! - `PeerRequest` / `PeerReply` for the peer RPC channel
//!
//! This is a pure types crate with no I/O operations. Everything
//! serializes as JSON via serde; the wire tags (`PAGE_METRICS`,
//! `QUEUE_SYNCED`, ...) match what host adapters put on the channel.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod messages;
mod metrics;
mod visit;

pub use messages::{PeerId, PeerReply, PeerRequest, RuntimeMessage, SyncAck};
pub use metrics::PageMetrics;
pub use visit::{Visit, VisitRecord};
