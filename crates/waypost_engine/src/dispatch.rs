//! Event dispatch glue.
//!
//! Translates host runtime messages and peer lifecycle signals into
//! calls on the sync manager and the metrics retriever. No policy
//! lives here; the interesting state machines are behind those two.

use crate::http::HttpClient;
use crate::notify::MessageSink;
use crate::retry::{MetricsRetriever, PeerChannel};
use crate::store::{KeyValueStore, LAST_METRICS_KEY, LAST_UPDATE_KEY};
use crate::sync::SyncManager;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};
use waypost_protocol::{PageMetrics, PeerId, RuntimeMessage, SyncAck};

/// What the host knows about a peer when a lifecycle signal fires.
#[derive(Debug, Clone)]
pub struct PeerDescriptor {
    /// The peer's channel address.
    pub id: PeerId,
    /// URL of the page the peer is attached to, if known.
    pub url: Option<String>,
    /// Whether the peer's page has finished loading.
    pub ready: bool,
}

impl PeerDescriptor {
    /// Creates a descriptor for a ready peer on the given URL.
    pub fn ready(id: PeerId, url: impl Into<String>) -> Self {
        Self {
            id,
            url: Some(url.into()),
            ready: true,
        }
    }
}

/// Routes external events into the engine.
pub struct Dispatcher<S, C, P, N>
where
    S: KeyValueStore,
    C: HttpClient,
    P: PeerChannel,
    N: MessageSink,
{
    sync: Arc<SyncManager<S, C, N>>,
    retriever: MetricsRetriever<P, N>,
    store: Arc<S>,
    settle_delay: Duration,
}

impl<S, C, P, N> Dispatcher<S, C, P, N>
where
    S: KeyValueStore + 'static,
    C: HttpClient + 'static,
    P: PeerChannel,
    N: MessageSink + 'static,
{
    /// Creates a dispatcher.
    ///
    /// `settle_delay` is how long to wait after a peer reports loaded
    /// before asking it for metrics, giving late-attaching peers a
    /// moment to come up.
    pub fn new(
        sync: Arc<SyncManager<S, C, N>>,
        retriever: MetricsRetriever<P, N>,
        store: Arc<S>,
        settle_delay: Duration,
    ) -> Self {
        Self {
            sync,
            retriever,
            store,
            settle_delay,
        }
    }

    /// Handles one inbound runtime message.
    ///
    /// Only a manual sync request produces an acknowledgement; the sync
    /// itself cannot fail, so the ack always reports success.
    pub async fn handle_message(&self, message: RuntimeMessage) -> Option<SyncAck> {
        match message {
            RuntimeMessage::PageMetrics(metrics) => {
                self.cache_metrics(&metrics).await;
                self.retriever.publish_update(metrics).await;
                None
            }
            RuntimeMessage::SyncQueue => {
                self.sync.reset_for_manual_sync();
                self.sync.sync_queued_visits().await;
                Some(SyncAck { success: true })
            }
            // Outbound notifications looping back on the channel.
            RuntimeMessage::QueueSynced | RuntimeMessage::MetricsUpdated(_) => None,
        }
    }

    /// Handles a peer gaining focus.
    pub async fn handle_peer_focused(&self, peer: &PeerDescriptor) {
        if !Self::collectable(peer) {
            return;
        }
        self.fetch_and_publish(peer.id).await;
    }

    /// Handles a peer finishing a page load. Waits the settle delay
    /// before asking for metrics.
    pub async fn handle_peer_loaded(&self, peer: &PeerDescriptor) {
        if !Self::collectable(peer) {
            return;
        }
        tokio::time::sleep(self.settle_delay).await;
        self.fetch_and_publish(peer.id).await;
    }

    async fn fetch_and_publish(&self, peer: PeerId) {
        match self.retriever.metrics_with_retry(peer).await {
            Ok(metrics) => self.retriever.publish_update(metrics).await,
            Err(err) => {
                // Still unreachable after the retry ceiling; expected
                // for restricted pages.
                debug!("metrics fetch abandoned: {err}");
            }
        }
    }

    async fn cache_metrics(&self, metrics: &PageMetrics) {
        let Ok(value) = serde_json::to_value(metrics) else {
            return;
        };
        let entries = HashMap::from([
            (LAST_METRICS_KEY.to_string(), value),
            (LAST_UPDATE_KEY.to_string(), serde_json::json!(epoch_ms())),
        ]);
        if let Err(err) = self.store.set(entries).await {
            warn!("failed to cache metrics: {err}");
        }
    }

    fn collectable(peer: &PeerDescriptor) -> bool {
        peer.ready
            && peer
                .url
                .as_deref()
                .is_some_and(|url| url.starts_with("http://") || url.starts_with("https://"))
    }
}

fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackoffConfig, RetryPolicy, SyncConfig};
    use crate::http::MockHttpClient;
    use crate::notify::RecordingSink;
    use crate::retry::MockPeer;
    use crate::store::{MemoryStore, VISIT_QUEUE_KEY};
    use tokio::time::Instant;
    use waypost_protocol::Visit;

    struct Harness {
        dispatcher: Dispatcher<MemoryStore, Arc<MockHttpClient>, MockPeer, RecordingSink>,
        sync: Arc<SyncManager<MemoryStore, Arc<MockHttpClient>, RecordingSink>>,
        store: Arc<MemoryStore>,
        http: Arc<MockHttpClient>,
        peer: Arc<MockPeer>,
        sink: Arc<RecordingSink>,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let http = Arc::new(MockHttpClient::new());
        let sink = Arc::new(RecordingSink::new());
        let peer = Arc::new(MockPeer::new());

        let sync = Arc::new(SyncManager::new(
            SyncConfig::new("http://localhost:8000/api/v1"),
            BackoffConfig::new(
                Duration::from_millis(1000),
                Duration::from_millis(300_000),
                5,
            ),
            Arc::clone(&store),
            Arc::clone(&http),
            Arc::clone(&sink),
        ));
        let retriever = MetricsRetriever::new(
            RetryPolicy::new(3, Duration::from_millis(100)),
            Arc::clone(&peer),
            Arc::clone(&sink),
        );
        let dispatcher = Dispatcher::new(
            Arc::clone(&sync),
            retriever,
            Arc::clone(&store),
            Duration::from_millis(800),
        );

        Harness {
            dispatcher,
            sync,
            store,
            http,
            peer,
            sink,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn page_metrics_are_cached_and_forwarded() {
        let h = harness();
        let metrics = PageMetrics::new("https://example.com").with_counts(100, 5, 2);

        let ack = h
            .dispatcher
            .handle_message(RuntimeMessage::PageMetrics(metrics))
            .await;

        assert!(ack.is_none());
        assert_eq!(h.store.value(LAST_METRICS_KEY).unwrap()["url"], "https://example.com");
        assert!(h.store.value(LAST_UPDATE_KEY).unwrap().is_number());
        assert_eq!(
            h.sink
                .count_matching(|m| matches!(m, RuntimeMessage::MetricsUpdated(_))),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn manual_sync_resets_and_drains() {
        let h = harness();
        h.store.insert(
            VISIT_QUEUE_KEY,
            serde_json::to_value(vec![Visit::new("https://example.com", 1)]).unwrap(),
        );
        h.http.fail_times(5);

        // Drive the manager into exhaustion: the sixth cycle is a no-op.
        for _ in 0..6 {
            h.sync.sync_queued_visits().await;
        }
        assert_eq!(h.http.call_count(), 5);
        assert_eq!(h.sync.failure_count(), 5);

        // A manual sync resets the streak and reaches the collector.
        let ack = h
            .dispatcher
            .handle_message(RuntimeMessage::SyncQueue)
            .await;
        assert_eq!(ack, Some(SyncAck { success: true }));
        assert_eq!(h.http.call_count(), 6);
        assert!(!h.store.contains(VISIT_QUEUE_KEY));
    }

    #[tokio::test(start_paused = true)]
    async fn outbound_messages_are_ignored() {
        let h = harness();
        assert!(h
            .dispatcher
            .handle_message(RuntimeMessage::QueueSynced)
            .await
            .is_none());
        assert_eq!(h.peer.attempts(), 0);
        assert_eq!(h.http.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn focused_peer_is_queried_and_published() {
        let h = harness();
        h.peer
            .set_metrics(PageMetrics::new("https://example.com").with_counts(42, 3, 1));

        h.dispatcher
            .handle_peer_focused(&PeerDescriptor::ready(PeerId(1), "https://example.com"))
            .await;

        assert_eq!(h.peer.attempts(), 1);
        assert_eq!(
            h.sink
                .count_matching(|m| matches!(m, RuntimeMessage::MetricsUpdated(_))),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn restricted_and_unready_peers_are_skipped() {
        let h = harness();

        h.dispatcher
            .handle_peer_focused(&PeerDescriptor::ready(PeerId(1), "about:config"))
            .await;
        h.dispatcher
            .handle_peer_focused(&PeerDescriptor {
                id: PeerId(2),
                url: Some("https://example.com".into()),
                ready: false,
            })
            .await;
        h.dispatcher
            .handle_peer_focused(&PeerDescriptor {
                id: PeerId(3),
                url: None,
                ready: true,
            })
            .await;

        assert_eq!(h.peer.attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn loaded_peer_waits_the_settle_delay() {
        let h = harness();
        h.peer.set_metrics(PageMetrics::new("https://example.com"));

        let started = Instant::now();
        h.dispatcher
            .handle_peer_loaded(&PeerDescriptor::ready(PeerId(1), "https://example.com"))
            .await;

        assert_eq!(started.elapsed(), Duration::from_millis(800));
        assert_eq!(h.peer.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_peer_is_absorbed() {
        let h = harness();
        h.peer.fail_times(10);

        h.dispatcher
            .handle_peer_focused(&PeerDescriptor::ready(PeerId(1), "https://example.com"))
            .await;

        // Retried to the ceiling, then dropped without a publish.
        assert_eq!(h.peer.attempts(), 3);
        assert_eq!(
            h.sink
                .count_matching(|m| matches!(m, RuntimeMessage::MetricsUpdated(_))),
            0
        );
    }
}
