use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
struct Counters {
    enqueued: AtomicU64,
    started: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

static COUNTERS: Lazy<Counters> = Lazy::new(Counters::default);

fn increment(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

pub fn record_enqueued() {
    increment(&COUNTERS.enqueued);
}

pub fn record_started() {
    increment(&COUNTERS.started);
}

pub fn record_succeeded() {
    increment(&COUNTERS.succeeded);
}

pub fn record_failed() {
    increment(&COUNTERS.failed);
}

#[derive(Clone, Debug, Default)]
pub struct DispatchMetricsSnapshot {
    pub enqueued: u64,
    pub started: u64,
    pub succeeded: u64,
    pub failed: u64,
}

pub fn snapshot() -> DispatchMetricsSnapshot {
    DispatchMetricsSnapshot {
        enqueued: COUNTERS.enqueued.load(Ordering::Relaxed),
        started: COUNTERS.started.load(Ordering::Relaxed),
        succeeded: COUNTERS.succeeded.load(Ordering::Relaxed),
        failed: COUNTERS.failed.load(Ordering::Relaxed),
    }
}
