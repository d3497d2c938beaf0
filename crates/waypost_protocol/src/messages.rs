//! Channel messages.
//!
//! Two channels exist: the host runtime messaging channel (fire-and-forget
//! broadcast, a missing listener is acceptable) and the peer RPC channel
//! (request/reply against a single peer). Both speak tagged JSON.

use crate::metrics::PageMetrics;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a transient peer process, such as a tab's content
/// process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerId(pub u32);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

/// A message on the host runtime channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuntimeMessage {
    /// A peer reports metrics for the page it is attached to.
    PageMetrics(PageMetrics),
    /// A listener requests an immediate manual sync of the queue.
    SyncQueue,
    /// The queued visits were shipped to the collector.
    QueueSynced,
    /// Fresh metrics are available for display.
    MetricsUpdated(PageMetrics),
}

/// A request sent to a peer over the RPC channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeerRequest {
    /// Ask the peer to measure and return its page metrics.
    GetMetrics,
}

/// A reply from a peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeerReply {
    /// The peer's current page metrics.
    Metrics(PageMetrics),
}

/// Acknowledgement returned to the requester of a manual sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncAck {
    /// Whether the sync request was carried out.
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_message_tags() {
        let json = serde_json::to_value(&RuntimeMessage::QueueSynced).unwrap();
        assert_eq!(json["type"], "QUEUE_SYNCED");

        let metrics = PageMetrics::new("https://example.com");
        let json = serde_json::to_value(&RuntimeMessage::MetricsUpdated(metrics)).unwrap();
        assert_eq!(json["type"], "METRICS_UPDATED");
        assert_eq!(json["data"]["url"], "https://example.com");
    }

    #[test]
    fn inbound_messages_parse() {
        let msg: RuntimeMessage = serde_json::from_value(serde_json::json!({
            "type": "PAGE_METRICS",
            "data": {"url": "https://example.com", "word_count": 10}
        }))
        .unwrap();
        match msg {
            RuntimeMessage::PageMetrics(m) => assert_eq!(m.word_count, 10),
            other => panic!("unexpected message: {other:?}"),
        }

        let msg: RuntimeMessage =
            serde_json::from_value(serde_json::json!({"type": "SYNC_QUEUE"})).unwrap();
        assert_eq!(msg, RuntimeMessage::SyncQueue);
    }

    #[test]
    fn peer_request_tag() {
        let json = serde_json::to_value(&PeerRequest::GetMetrics).unwrap();
        assert_eq!(json["type"], "GET_METRICS");
    }

    #[test]
    fn peer_id_display() {
        assert_eq!(PeerId(7).to_string(), "peer-7");
    }
}
