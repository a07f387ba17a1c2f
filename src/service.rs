//! Orchestrates ingestion, viewed-event requests and dispatch for every tab.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use url::Url;

use searchads_core_types::{AdsError, TabId};
use searchads_entities::{validate, TabAdMap};
use searchads_policy_center::PolicyView;
use searchads_registry::{IngestionTicket, Parking, PendingViewedRequest, TabSessions};
use searchads_scheduler::{
    AdEventReporter, DispatchConfig, DispatchSection, QueueStatus, ViewedEventQueue,
};

use crate::ports::{PageMetadataSource, ReportingGate};

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    /// A fetch running longer than this counts as "no document".
    pub fetch_timeout: Duration,
    pub dispatch: DispatchConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(10),
            dispatch: DispatchConfig::default(),
        }
    }
}

impl From<&PolicyView> for ServiceConfig {
    fn from(view: &PolicyView) -> Self {
        Self {
            fetch_timeout: view.fetch_timeout(),
            dispatch: DispatchConfig {
                report_timeout: view.report_timeout(),
            },
        }
    }
}

/// Search result ad pipeline for all tabs. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SearchResultAdService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    sessions: TabSessions,
    queue: ViewedEventQueue,
    metadata: Arc<dyn PageMetadataSource>,
    gate: Arc<dyn ReportingGate>,
    config: ServiceConfig,
    fetch_waiters: Mutex<Vec<oneshot::Sender<TabId>>>,
}

impl SearchResultAdService {
    pub fn new(
        metadata: Arc<dyn PageMetadataSource>,
        reporter: Arc<dyn AdEventReporter>,
        gate: Arc<dyn ReportingGate>,
        config: ServiceConfig,
    ) -> Self {
        let queue = ViewedEventQueue::new(reporter, config.dispatch.clone());
        Self {
            inner: Arc::new(ServiceInner {
                sessions: TabSessions::new(),
                queue,
                metadata,
                gate,
                config,
                fetch_waiters: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Starts ingestion for a committed page. The attempt is registered before
    /// this returns; the returned future fetches the document, stores the ads
    /// and answers the tab's waiting requests. It owns its state and can be
    /// spawned.
    ///
    /// When `should_trigger` is false, ads or the feature are off, or `url` is
    /// not an allowed search host, the tab gets an empty ad map without a
    /// fetch.
    pub fn maybe_ingest(
        &self,
        tab: TabId,
        url: &Url,
        should_trigger: bool,
    ) -> impl Future<Output = ()> + Send + 'static {
        let ticket = self.inner.sessions.begin_ingestion(&tab);
        let allowed = should_trigger
            && self.inner.gate.is_reporting_enabled()
            && self.inner.gate.confirmation_events_enabled()
            && self.inner.gate.is_request_allowed_for_host(url);
        if !allowed {
            debug!(%tab, %url, should_trigger, "search result ad ingestion gated off");
        }

        let inner = Arc::clone(&self.inner);
        async move {
            let ads = if allowed {
                inner.fetch_ads(&ticket.tab).await
            } else {
                TabAdMap::new()
            };
            inner.finish_ingestion(&ticket, ads);
            inner.notify_fetch_finished(&ticket.tab);
        }
    }

    pub fn on_navigation_finished(&self, tab: &TabId) {
        self.on_tab_reset(tab);
    }

    pub fn on_tab_closed(&self, tab: &TabId) {
        self.on_tab_reset(tab);
    }

    /// Drops the tab's ads and waiting requests. A fetch still in flight for
    /// the tab completes into nothing.
    pub fn on_tab_reset(&self, tab: &TabId) {
        let abandoned = self.inner.sessions.reset(tab);
        if abandoned > 0 {
            info!(%tab, abandoned, "abandoned search result ad viewed requests");
        }
    }

    /// Asks for a viewed confirmation of `creative_instance_id`.
    ///
    /// The request is registered before this returns. The future yields
    /// `true` once the event was handed to the dispatch queue, `false` when
    /// the ad is unknown or was already used, and `AdsError::Abandoned` when
    /// the tab was reset while the request waited for ingestion.
    ///
    /// # Panics
    ///
    /// Same runtime requirement as [`resolve`](Self::resolve) when the tab's
    /// ads are already known.
    pub fn request_viewed_event(
        &self,
        tab: TabId,
        creative_instance_id: &str,
    ) -> impl Future<Output = Result<bool, AdsError>> + Send + 'static {
        let answer = self.register_viewed_request(&tab, creative_instance_id);
        async move {
            match answer {
                ViewedAnswer::Now(triggered) => Ok(triggered),
                ViewedAnswer::Later(rx) => rx.await.map_err(|_| AdsError::Abandoned(tab)),
            }
        }
    }

    fn register_viewed_request(&self, tab: &TabId, creative_instance_id: &str) -> ViewedAnswer {
        if !self.inner.gate.is_reporting_enabled() {
            debug!(%tab, creative_instance_id, "ads disabled; viewed event not triggered");
            return ViewedAnswer::Now(false);
        }

        let (tx, rx) = oneshot::channel();
        let request = PendingViewedRequest::new(creative_instance_id, tx);
        match self.inner.sessions.park_viewed_request(tab, request) {
            Parking::Parked => ViewedAnswer::Later(rx),
            Parking::Ready(request) => {
                let triggered = self.inner.resolve(tab, &request.creative_instance_id);
                request.complete(triggered);
                ViewedAnswer::Now(triggered)
            }
        }
    }

    /// Moves the ad into the dispatch queue. `false` when the tab has no such
    /// ad.
    ///
    /// # Panics
    ///
    /// Starting the dispatch spawns a task, so a call that finds the ad must
    /// run inside a tokio runtime unless a [`DispatchSection`] is open.
    pub fn resolve(&self, tab: &TabId, creative_instance_id: &str) -> bool {
        self.inner.resolve(tab, creative_instance_id)
    }

    /// Holds dispatching back until the guard drops, so ads resolved in a
    /// row go out newest first on any runtime flavor.
    pub fn dispatch_section(&self) -> DispatchSection {
        self.inner.queue.section()
    }

    /// Resolves once the next metadata round trip finishes, gated-off ones
    /// included. Yields the tab it finished for.
    pub fn metadata_request_finished_for_testing(&self) -> oneshot::Receiver<TabId> {
        let (tx, rx) = oneshot::channel();
        self.inner.fetch_waiters.lock().push(tx);
        rx
    }

    pub fn has_ads(&self, tab: &TabId) -> bool {
        self.inner.sessions.has_ads(tab)
    }

    pub fn ad_count(&self, tab: &TabId) -> Option<usize> {
        self.inner.sessions.ad_count(tab)
    }

    pub fn contains_ad(&self, tab: &TabId, creative_instance_id: &str) -> bool {
        self.inner.sessions.contains_ad(tab, creative_instance_id)
    }

    pub fn pending_count(&self, tab: &TabId) -> usize {
        self.inner.sessions.pending_count(tab)
    }

    pub fn queue_status(&self) -> QueueStatus {
        self.inner.queue.status()
    }

    pub fn queued_events(&self) -> usize {
        self.inner.queue.pending()
    }
}

enum ViewedAnswer {
    Now(bool),
    Later(oneshot::Receiver<bool>),
}

impl ServiceInner {
    async fn fetch_ads(&self, tab: &TabId) -> TabAdMap {
        let fetch = self.metadata.fetch_page_entities(tab);
        match tokio::time::timeout(self.config.fetch_timeout, fetch).await {
            Ok(Some(page)) => validate(&page),
            Ok(None) => {
                debug!(%tab, "no structured data for search result ads");
                TabAdMap::new()
            }
            Err(_) => {
                warn!(
                    %tab,
                    timeout_ms = self.config.fetch_timeout.as_millis() as u64,
                    "search result ad metadata fetch timed out"
                );
                TabAdMap::new()
            }
        }
    }

    fn finish_ingestion(&self, ticket: &IngestionTicket, ads: TabAdMap) {
        let count = ads.len();
        let pending = match self.sessions.complete_ingestion(ticket, ads) {
            Ok(pending) => pending,
            Err(err) => {
                debug!(error = %err, "discarding late search result ad ingestion");
                return;
            }
        };
        debug!(tab = %ticket.tab, ads = count, pending = pending.len(), "search result ads ingested");

        if pending.is_empty() {
            return;
        }
        let enabled = self.gate.is_reporting_enabled();
        // Waiting requests are answered in arrival order and go out newest
        // first; the section keeps the drain from starting in between.
        let _section = self.queue.section();
        for request in pending {
            let triggered = enabled && self.resolve(&ticket.tab, &request.creative_instance_id);
            debug!(
                tab = %ticket.tab,
                creative_instance_id = %request.creative_instance_id,
                waited_ms = request.waited_ms(),
                triggered,
                "answered waiting viewed event request"
            );
            request.complete(triggered);
        }
    }

    fn resolve(&self, tab: &TabId, creative_instance_id: &str) -> bool {
        match self.sessions.take_ad(tab, creative_instance_id) {
            Some(ad) => {
                let seq = self.queue.enqueue(ad);
                debug!(%tab, creative_instance_id, seq, "search result ad viewed event queued");
                true
            }
            None => {
                debug!(%tab, creative_instance_id, "no search result ad to confirm");
                false
            }
        }
    }

    fn notify_fetch_finished(&self, tab: &TabId) {
        let waiters = std::mem::take(&mut *self.fetch_waiters.lock());
        for waiter in waiters {
            let _ = waiter.send(tab.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::PolicyGate;
    use crate::ports::StaticMetadataSource;
    use async_trait::async_trait;
    use searchads_entities::testing::{ad_entity, product_page};
    use searchads_entities::AdRecord;
    use searchads_policy_center::{default_snapshot, PolicySnapshot};
    use searchads_scheduler::{AdEventKind, ReportOutcome};
    use tokio::sync::mpsc;

    struct ChannelReporter(mpsc::UnboundedSender<String>);

    #[async_trait]
    impl AdEventReporter for ChannelReporter {
        async fn trigger_ad_event(&self, ad: AdRecord, _kind: AdEventKind) -> ReportOutcome {
            let _ = self.0.send(ad.creative_instance_id.clone());
            ReportOutcome::succeeded(ad.placement_id)
        }
    }

    fn service(
        enabled: bool,
    ) -> (SearchResultAdService, Arc<StaticMetadataSource>, mpsc::UnboundedReceiver<String>) {
        let mut snapshot = default_snapshot();
        snapshot.ads.enabled = enabled;
        service_with(snapshot)
    }

    fn service_with(
        snapshot: PolicySnapshot,
    ) -> (SearchResultAdService, Arc<StaticMetadataSource>, mpsc::UnboundedReceiver<String>) {
        let source = Arc::new(StaticMetadataSource::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let service = SearchResultAdService::new(
            source.clone(),
            Arc::new(ChannelReporter(tx)),
            Arc::new(PolicyGate::fixed(snapshot)),
            ServiceConfig::default(),
        );
        (service, source, rx)
    }

    fn search_url() -> Url {
        Url::parse("https://search.brave.com/search?q=test").unwrap()
    }

    #[tokio::test]
    async fn viewed_request_after_ingestion_consumes_ad_once() {
        let (service, source, mut rx) = service(true);
        let tab = TabId::from("tab-1");
        source.insert(tab.clone(), product_page(vec![ad_entity("cid-1")]));

        service.maybe_ingest(tab.clone(), &search_url(), true).await;
        assert!(service.contains_ad(&tab, "cid-1"));

        assert!(service.request_viewed_event(tab.clone(), "cid-1").await.unwrap());
        assert!(!service.request_viewed_event(tab.clone(), "cid-1").await.unwrap());
        assert_eq!(rx.recv().await.as_deref(), Some("cid-1"));
    }

    #[tokio::test]
    async fn ads_disabled_answers_false_without_touching_map() {
        let (service, source, _rx) = service(false);
        let tab = TabId::from("tab-1");
        source.insert(tab.clone(), product_page(vec![ad_entity("cid-1")]));

        assert!(!service.request_viewed_event(tab.clone(), "cid-1").await.unwrap());
        assert_eq!(service.pending_count(&tab), 0);
    }

    #[tokio::test]
    async fn gated_off_ingestion_stores_empty_map_and_fires_hook() {
        let (service, source, _rx) = service(true);
        let tab = TabId::from("tab-1");
        source.insert(tab.clone(), product_page(vec![ad_entity("cid-1")]));

        let pending = service.request_viewed_event(tab.clone(), "cid-1");
        let hook = service.metadata_request_finished_for_testing();
        let http = Url::parse("http://search.brave.com/search?q=test").unwrap();
        service.maybe_ingest(tab.clone(), &http, true).await;

        assert_eq!(hook.await.unwrap(), tab);
        assert_eq!(service.ad_count(&tab), Some(0));
        assert!(!pending.await.unwrap());
    }

    #[tokio::test]
    async fn should_trigger_false_skips_fetch() {
        let (service, source, _rx) = service(true);
        let tab = TabId::from("tab-1");
        source.insert(tab.clone(), product_page(vec![ad_entity("cid-1")]));

        service.maybe_ingest(tab.clone(), &search_url(), false).await;
        assert!(service.has_ads(&tab));
        assert!(!service.contains_ad(&tab, "cid-1"));
    }

    #[tokio::test]
    async fn confirmation_events_flag_off_gates_ingestion() {
        let mut snapshot = default_snapshot();
        snapshot.features.search_result_ad_confirmation_events = false;
        let (service, source, _rx) = service_with(snapshot);
        let tab = TabId::from("tab-1");
        source.insert(tab.clone(), product_page(vec![ad_entity("cid-1")]));

        let pending = service.request_viewed_event(tab.clone(), "cid-1");
        assert_eq!(service.pending_count(&tab), 1);
        let hook = service.metadata_request_finished_for_testing();
        service.maybe_ingest(tab.clone(), &search_url(), true).await;

        assert_eq!(hook.await.unwrap(), tab);
        assert_eq!(service.ad_count(&tab), Some(0));
        assert!(!pending.await.unwrap());
        assert_eq!(service.queued_events(), 0);
    }

    #[tokio::test]
    async fn pending_requests_flush_newest_first() {
        let (service, source, mut rx) = service(true);
        let tab = TabId::from("tab-1");
        source.insert(tab.clone(), product_page(vec![ad_entity("a"), ad_entity("b")]));

        let first = service.request_viewed_event(tab.clone(), "a");
        let second = service.request_viewed_event(tab.clone(), "b");
        service.maybe_ingest(tab.clone(), &search_url(), true).await;

        assert!(first.await.unwrap());
        assert!(second.await.unwrap());
        assert_eq!(rx.recv().await.as_deref(), Some("b"));
        assert_eq!(rx.recv().await.as_deref(), Some("a"));
    }

    #[test]
    fn unknown_ad_resolves_without_a_runtime() {
        let (service, _source, _rx) = service(true);
        assert!(!service.resolve(&TabId::from("tab-1"), "cid-1"));
    }
}
