//! Queue synchronization state machine.

use crate::backoff::BackoffCalculator;
use crate::config::{BackoffConfig, SyncConfig};
use crate::error::{EngineError, EngineResult};
use crate::http::{CollectorClient, HttpClient};
use crate::notify::{Delivery, MessageSink};
use crate::store::{KeyValueStore, VISIT_QUEUE_KEY};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, warn};
use waypost_protocol::{RuntimeMessage, Visit, VisitRecord};

/// Mutable state owned exclusively by the sync manager.
///
/// `current_interval` is always a value the backoff calculator could
/// have produced for the current `failure_count`; nothing else ever
/// sets it.
struct SyncState {
    failure_count: u32,
    last_attempt: Option<Instant>,
    current_interval: Duration,
    pending_timer: Option<JoinHandle<()>>,
}

/// Statistics about sync cycles.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Total cycles run, whatever their outcome.
    pub cycles_completed: u64,
    /// Batches accepted by the collector.
    pub batches_shipped: u64,
    /// Visits contained in those batches.
    pub visits_shipped: u64,
    /// Failed submissions.
    pub failures: u64,
    /// Last submission error, cleared on success.
    pub last_error: Option<String>,
}

/// Synchronizes the persisted visit queue to the collector.
///
/// The manager owns its backoff state and its timer handle; it is
/// constructed once at process start and shared by reference with
/// whatever dispatches events into it. A cycle drains the whole queue
/// ("read all, remove all"; there is no per-item acknowledgement), so
/// a visit enqueued between the read and the remove of the same cycle
/// is lost. The store offers no compare-and-swap to close that window;
/// the race is accepted and kept.
///
/// No error ever escapes [`SyncManager::sync_queued_visits`]: every
/// failure is absorbed into `failure_count`/`current_interval`, and
/// callers observe progress through the accessors, [`SyncStats`], or
/// the `QUEUE_SYNCED` notification.
///
/// All methods expect the single cooperative thread of the host
/// runtime; locks are never held across await points.
pub struct SyncManager<S, C, N>
where
    S: KeyValueStore,
    C: HttpClient,
    N: MessageSink,
{
    config: SyncConfig,
    backoff: BackoffCalculator,
    store: Arc<S>,
    collector: CollectorClient<C>,
    sink: Arc<N>,
    state: Mutex<SyncState>,
    stats: Mutex<SyncStats>,
}

impl<S, C, N> SyncManager<S, C, N>
where
    S: KeyValueStore + 'static,
    C: HttpClient + 'static,
    N: MessageSink + 'static,
{
    /// Creates a sync manager.
    pub fn new(
        config: SyncConfig,
        backoff_config: BackoffConfig,
        store: Arc<S>,
        client: C,
        sink: Arc<N>,
    ) -> Self {
        let backoff = BackoffCalculator::new(backoff_config);
        let collector =
            CollectorClient::new(config.api_base_url.clone(), config.api_timeout, client);
        let initial_interval = backoff.calculate_interval(0);

        Self {
            config,
            backoff,
            store,
            collector,
            sink,
            state: Mutex::new(SyncState {
                failure_count: 0,
                last_attempt: None,
                current_interval: initial_interval,
                pending_timer: None,
            }),
            stats: Mutex::new(SyncStats::default()),
        }
    }

    /// Current consecutive-failure count.
    pub fn failure_count(&self) -> u32 {
        self.state.lock().failure_count
    }

    /// Interval the next timer will be armed with.
    pub fn current_interval(&self) -> Duration {
        self.state.lock().current_interval
    }

    /// Time of the most recent sync attempt, if any.
    pub fn last_attempt(&self) -> Option<Instant> {
        self.state.lock().last_attempt
    }

    /// Whether a timer is currently armed.
    pub fn has_pending_sync(&self) -> bool {
        self.state.lock().pending_timer.is_some()
    }

    /// Current statistics.
    pub fn stats(&self) -> SyncStats {
        self.stats.lock().clone()
    }

    /// Runs one sync cycle.
    ///
    /// Reads the whole queue; an empty queue makes no HTTP call and only
    /// heals a prior failure streak. In the exhausted state (failure
    /// count at the ceiling) the cycle makes no HTTP call and leaves
    /// both state and queue untouched, waiting for a manual reset or an
    /// emptied queue. Otherwise the queue is submitted as one batch with
    /// local timestamps stripped; success clears the queue and resets
    /// the backoff state, failure deepens it.
    pub async fn sync_queued_visits(&self) {
        self.state.lock().last_attempt = Some(Instant::now());
        self.stats.lock().cycles_completed += 1;

        let queue = match self.read_queue().await {
            Ok(queue) => queue,
            Err(err) => {
                // Local store trouble says nothing about collector
                // health; leave the backoff state alone and let the
                // next cycle retry the read.
                warn!("failed to read visit queue: {err}");
                return;
            }
        };

        if queue.is_empty() {
            let mut state = self.state.lock();
            if state.failure_count > 0 {
                state.failure_count = 0;
                state.current_interval = self.backoff.calculate_interval(0);
            }
            return;
        }

        let failure_count = self.state.lock().failure_count;
        if !self.backoff.should_retry(failure_count) {
            // Exhausted: the queue stays intact for a manual sync or a
            // later cycle.
            return;
        }

        let records: Vec<VisitRecord> = queue.iter().map(Visit::to_record).collect();
        match self.collector.submit_batch(&records).await {
            Ok(()) => self.finish_success(records.len() as u64).await,
            Err(err) => self.handle_sync_failure(&err),
        }
    }

    async fn finish_success(&self, shipped: u64) {
        if let Err(err) = self.store.remove(&[VISIT_QUEUE_KEY]).await {
            warn!("batch accepted but clearing the queue failed: {err}");
        }
        self.reset_state();

        {
            let mut stats = self.stats.lock();
            stats.batches_shipped += 1;
            stats.visits_shipped += shipped;
            stats.last_error = None;
        }

        match self.sink.send(RuntimeMessage::QueueSynced).await {
            Delivery::Delivered | Delivery::NoReceiver => {}
        }
    }

    fn handle_sync_failure(&self, err: &EngineError) {
        let (failure_count, interval) = {
            let mut state = self.state.lock();
            state.failure_count += 1;
            state.current_interval = self.backoff.calculate_interval(state.failure_count);
            (state.failure_count, state.current_interval)
        };

        {
            let mut stats = self.stats.lock();
            stats.failures += 1;
            stats.last_error = Some(err.to_string());
        }

        if self.config.dev_mode {
            let max_retries = self.backoff.max_retries();
            if self.backoff.should_retry(failure_count) {
                warn!(
                    "sync failed (attempt {failure_count}/{max_retries}), \
                     next retry in {interval:?}: {err}"
                );
            } else {
                error!(
                    "sync failed after {max_retries} attempts, waiting \
                     {interval:?} or for a manual sync: {err}"
                );
            }
        }
    }

    fn reset_state(&self) {
        let mut state = self.state.lock();
        state.failure_count = 0;
        state.current_interval = self.backoff.calculate_interval(0);
    }

    /// Resets the failure streak so an explicit user-triggered sync can
    /// bypass an exhausted backoff state. Any pending timer is left
    /// untouched.
    pub fn reset_for_manual_sync(&self) {
        self.reset_state();
    }

    /// Arms the sync timer at the current interval, superseding any
    /// previously armed timer. When the timer fires it runs one cycle
    /// and re-arms itself, so a single call here keeps the loop running
    /// for the life of the process.
    pub fn schedule_next_sync(self: &Arc<Self>) {
        let manager = Arc::downgrade(self);
        let mut state = self.state.lock();
        if let Some(timer) = state.pending_timer.take() {
            timer.abort();
        }

        let interval = state.current_interval;
        state.pending_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            let Some(manager) = manager.upgrade() else {
                return;
            };
            manager.state.lock().pending_timer = None;
            manager.sync_queued_visits().await;
            manager.schedule_next_sync();
        }));
    }

    /// Cancels the pending timer, if any.
    pub fn clear_scheduled_sync(&self) {
        if let Some(timer) = self.state.lock().pending_timer.take() {
            timer.abort();
        }
    }

    async fn read_queue(&self) -> EngineResult<Vec<Visit>> {
        crate::store::read_visit_queue(self.store.as_ref()).await
    }
}

impl<S, C, N> Drop for SyncManager<S, C, N>
where
    S: KeyValueStore,
    C: HttpClient,
    N: MessageSink,
{
    fn drop(&mut self) {
        if let Some(timer) = self.state.lock().pending_timer.take() {
            timer.abort();
        }
    }
}
