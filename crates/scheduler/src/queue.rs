use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use searchads_entities::AdRecord;

use crate::error::SchedulerError;
use crate::metrics;
use crate::model::{AdEventKind, DispatchConfig, DispatchEntry, QueueStatus, ReportOutcome};
use crate::reporter::AdEventReporter;
use crate::stack::DispatchStack;

/// Process-wide queue of ads awaiting their viewed confirmation. At most one
/// reporter call is in flight at any time; waiting entries go newest first.
///
/// Draining runs on a spawned task. Entries enqueued while a
/// [`DispatchSection`] is open are held until the last section closes, so
/// their relative order is fixed no matter which runtime flavor runs the
/// drain. Outside a section, ordering among back-to-back enqueues holds only
/// on a current-thread runtime.
#[derive(Clone)]
pub struct ViewedEventQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    state: Mutex<QueueState>,
    reporter: Arc<dyn AdEventReporter>,
    config: DispatchConfig,
    seq: AtomicU64,
}

#[derive(Default)]
struct QueueState {
    stack: DispatchStack,
    dispatching: bool,
    sections: usize,
}

impl QueueState {
    /// Claims the drain when there is work, nothing is in flight and no
    /// section holds the queue.
    fn claim_drain(&mut self) -> bool {
        if self.dispatching || self.sections > 0 || self.stack.is_empty() {
            return false;
        }
        self.dispatching = true;
        true
    }
}

impl ViewedEventQueue {
    pub fn new(reporter: Arc<dyn AdEventReporter>, config: DispatchConfig) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState::default()),
                reporter,
                config,
                seq: AtomicU64::new(0),
            }),
        }
    }

    /// Queues `ad` and starts draining when idle.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime while no section is open,
    /// since starting the drain spawns a task.
    pub fn enqueue(&self, ad: AdRecord) -> u64 {
        let seq = self.inner.seq.fetch_add(1, Ordering::Relaxed);
        debug!(
            seq,
            creative_instance_id = %ad.creative_instance_id,
            "queued search result ad viewed event"
        );
        let start_drain = {
            let mut state = self.inner.state.lock();
            state.stack.push(DispatchEntry::new(seq, ad));
            state.claim_drain()
        };
        metrics::record_enqueued();

        if start_drain {
            QueueInner::spawn_drain(&self.inner);
        }
        seq
    }

    /// Holds the drain back until the returned guard (and every other open
    /// section) is dropped. Everything enqueued meanwhile is then served
    /// newest first.
    #[must_use = "the section closes as soon as the guard is dropped"]
    pub fn section(&self) -> DispatchSection {
        self.inner.state.lock().sections += 1;
        DispatchSection {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn status(&self) -> QueueStatus {
        if self.inner.state.lock().dispatching {
            QueueStatus::Dispatching
        } else {
            QueueStatus::Idle
        }
    }

    /// Entries not yet handed to the reporter.
    pub fn pending(&self) -> usize {
        self.inner.state.lock().stack.len()
    }
}

/// Guard returned by [`ViewedEventQueue::section`]. Closing the last open
/// section starts the drain if entries are waiting, which needs a tokio
/// runtime.
pub struct DispatchSection {
    inner: Arc<QueueInner>,
}

impl Drop for DispatchSection {
    fn drop(&mut self) {
        let start_drain = {
            let mut state = self.inner.state.lock();
            state.sections = state.sections.saturating_sub(1);
            state.claim_drain()
        };
        if start_drain {
            QueueInner::spawn_drain(&self.inner);
        }
    }
}

impl QueueInner {
    fn spawn_drain(inner: &Arc<Self>) {
        let inner = Arc::clone(inner);
        tokio::spawn(async move {
            inner.drain().await;
        });
    }

    async fn drain(self: Arc<Self>) {
        let mut guard = DrainGuard {
            inner: &self,
            finished: false,
        };
        loop {
            let entry = {
                let mut state = self.state.lock();
                // An open section gets the remaining entries once it closes.
                let next = if state.sections > 0 {
                    None
                } else {
                    state.stack.pop()
                };
                match next {
                    Some(entry) => entry,
                    None => {
                        state.dispatching = false;
                        guard.finished = true;
                        return;
                    }
                }
            };
            let placement_id = entry.ad.placement_id.clone();
            let result = self.dispatch(entry).await;
            self.on_dispatch_result(result, &placement_id);
        }
    }

    async fn dispatch(&self, entry: DispatchEntry) -> Result<ReportOutcome, SchedulerError> {
        metrics::record_started();
        debug!(
            seq = entry.seq,
            wait_ms = entry.wait_ms(),
            placement_id = %entry.ad.placement_id,
            "triggering search result ad viewed event"
        );
        let call = self
            .reporter
            .trigger_ad_event(entry.ad, AdEventKind::Viewed);
        match tokio::time::timeout(self.config.report_timeout, call).await {
            Ok(outcome) if outcome.success => Ok(outcome),
            Ok(outcome) => Err(SchedulerError::Rejected(outcome.placement_id)),
            Err(_) => Err(SchedulerError::TimedOut(self.config.report_timeout)),
        }
    }

    /// Failures are logged and never retried; the next entry goes out either way.
    fn on_dispatch_result(&self, result: Result<ReportOutcome, SchedulerError>, placement_id: &str) {
        match result {
            Ok(outcome) => {
                metrics::record_succeeded();
                debug!(placement_id = %outcome.placement_id, "search result ad viewed event recorded");
            }
            Err(err) => {
                metrics::record_failed();
                warn!(%placement_id, error = %err, "error during processing of search result ad event");
            }
        }
    }
}

/// Clears the dispatching flag when a drain stops before emptying the queue,
/// whether by panic, abort or a dropped future, so the next enqueue starts a
/// fresh drain.
struct DrainGuard<'a> {
    inner: &'a QueueInner,
    finished: bool,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.inner.state.lock().dispatching = false;
        }
    }
}
