//! Bounded retry against transient peers.

use crate::config::RetryPolicy;
use crate::error::{EngineError, EngineResult};
use crate::notify::{Delivery, MessageSink};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::time::sleep;
use waypost_protocol::{PageMetrics, PeerId, PeerReply, PeerRequest, RuntimeMessage};

/// The peer RPC channel.
///
/// A "no receiver" soft-error from the host (the peer process has not
/// attached yet) surfaces here as [`EngineError::PeerUnreachable`]; the
/// retrier treats it like any other failure.
#[async_trait]
pub trait PeerChannel: Send + Sync {
    /// Sends a request to the peer and awaits its reply.
    async fn request(&self, peer: PeerId, request: PeerRequest) -> EngineResult<PeerReply>;
}

/// Executes a peer request up to `max_retries` times with linearly
/// growing delays.
///
/// Attempts number from 1. After attempt `k` fails (`k < max_retries`)
/// the retrier waits `base_delay * k` before attempt `k + 1`, so the
/// delay grows linearly, not exponentially: the usual failure mode is a
/// peer that finishes loading within a moment, which does not warrant
/// the sync manager's aggressive backoff. The final attempt's failure
/// propagates to the caller, which needs to distinguish "peer
/// unreachable" from "peer returned data".
#[derive(Debug, Clone)]
pub struct BoundedRetrier {
    policy: RetryPolicy,
}

impl BoundedRetrier {
    /// Creates a retrier with the given policy.
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Runs `request` against `peer`, retrying per the policy.
    pub async fn execute<C>(
        &self,
        channel: &C,
        peer: PeerId,
        request: PeerRequest,
    ) -> EngineResult<PeerReply>
    where
        C: PeerChannel + ?Sized,
    {
        let mut attempt = 1u32;
        loop {
            match channel.request(peer, request.clone()).await {
                Ok(reply) => return Ok(reply),
                Err(_) if attempt < self.policy.max_retries => {
                    sleep(self.policy.base_delay * attempt).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Fetches page metrics from peers and republishes them on the runtime
/// channel.
pub struct MetricsRetriever<C: PeerChannel, N: MessageSink> {
    retrier: BoundedRetrier,
    channel: Arc<C>,
    sink: Arc<N>,
}

impl<C: PeerChannel, N: MessageSink> MetricsRetriever<C, N> {
    /// Creates a retriever over the given channel and notification sink.
    pub fn new(policy: RetryPolicy, channel: Arc<C>, sink: Arc<N>) -> Self {
        Self {
            retrier: BoundedRetrier::new(policy),
            channel,
            sink,
        }
    }

    /// Asks the peer for its metrics, retrying while it attaches.
    pub async fn metrics_with_retry(&self, peer: PeerId) -> EngineResult<PageMetrics> {
        let reply = self
            .retrier
            .execute(self.channel.as_ref(), peer, PeerRequest::GetMetrics)
            .await?;
        match reply {
            PeerReply::Metrics(metrics) => Ok(metrics),
        }
    }

    /// Publishes a metrics update for any interested listener. A
    /// missing listener is swallowed.
    pub async fn publish_update(&self, metrics: PageMetrics) {
        match self.sink.send(RuntimeMessage::MetricsUpdated(metrics)).await {
            Delivery::Delivered | Delivery::NoReceiver => {}
        }
    }
}

/// A scripted peer for testing.
#[derive(Debug, Default)]
pub struct MockPeer {
    metrics: Mutex<Option<PageMetrics>>,
    failures_remaining: AtomicU32,
    attempts: AtomicU32,
}

impl MockPeer {
    /// Creates a peer with no scripted reply.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the metrics the peer will reply with.
    pub fn set_metrics(&self, metrics: PageMetrics) {
        *self.metrics.lock() = Some(metrics);
    }

    /// Makes the next `count` requests fail as unreachable.
    pub fn fail_times(&self, count: u32) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Number of requests the peer has seen.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PeerChannel for MockPeer {
    async fn request(&self, peer: PeerId, _request: PeerRequest) -> EngineResult<PeerReply> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(EngineError::peer_unreachable(peer, "no receiver"));
        }

        self.metrics
            .lock()
            .clone()
            .map(PeerReply::Metrics)
            .ok_or_else(|| EngineError::peer_unreachable(peer, "no scripted reply"))
    }
}
