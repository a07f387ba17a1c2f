use lazy_static::lazy_static;
use prometheus::{core::Collector, IntCounter, IntGauge, Registry};
use tracing::error;

lazy_static! {
    static ref TABS_TRACKED: IntGauge =
        IntGauge::new("searchads_registry_tabs", "Tabs with ad session state").unwrap();
    static ref PENDING_VIEWED_REQUESTS: IntGauge = IntGauge::new(
        "searchads_registry_pending_viewed_requests",
        "Viewed-event requests waiting for ingestion"
    )
    .unwrap();
    static ref ADS_STORED: IntCounter = IntCounter::new(
        "searchads_registry_ads_stored_total",
        "Search result ads stored after ingestion"
    )
    .unwrap();
    static ref STALE_COMPLETIONS: IntCounter = IntCounter::new(
        "searchads_registry_stale_completions_total",
        "Ingestion completions dropped because the tab moved on"
    )
    .unwrap();
    static ref ABANDONED_REQUESTS: IntCounter = IntCounter::new(
        "searchads_registry_abandoned_requests_total",
        "Pending viewed-event requests dropped by a tab reset"
    )
    .unwrap();
}

fn register<C>(registry: &Registry, collector: C)
where
    C: Collector + Clone + Send + Sync + 'static,
{
    if let Err(err) = registry.register(Box::new(collector.clone())) {
        if !matches!(err, prometheus::Error::AlreadyReg) {
            error!(?err, "failed to register ad registry metric");
        }
    }
}

pub fn register_metrics(registry: &Registry) {
    register(registry, TABS_TRACKED.clone());
    register(registry, PENDING_VIEWED_REQUESTS.clone());
    register(registry, ADS_STORED.clone());
    register(registry, STALE_COMPLETIONS.clone());
    register(registry, ABANDONED_REQUESTS.clone());
}

pub fn set_tab_count(count: usize) {
    TABS_TRACKED.set(count as i64);
}

pub fn pending_parked() {
    PENDING_VIEWED_REQUESTS.inc();
}

pub fn pending_released(count: usize) {
    PENDING_VIEWED_REQUESTS.sub(count as i64);
}

pub fn record_ads_stored(count: usize) {
    ADS_STORED.inc_by(count as u64);
}

pub fn record_stale_completion() {
    STALE_COMPLETIONS.inc();
}

pub fn record_abandoned(count: usize) {
    ABANDONED_REQUESTS.inc_by(count as u64);
}
