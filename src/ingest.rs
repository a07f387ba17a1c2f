use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

use searchads_core_types::TabId;
use searchads_event_bus::{EventBus, InMemoryBus};

use crate::service::SearchResultAdService;

/// Browser-side tab notifications that drive the ad pipeline.
#[derive(Clone, Debug)]
pub enum TabEvent {
    /// The page's document finished loading.
    DocumentLoaded {
        tab: TabId,
        url: Url,
        should_trigger: bool,
    },
    /// A navigation away from the tab's current page committed.
    NavigationFinished { tab: TabId },
    TabClosed { tab: TabId },
}

/// Consumes [`TabEvent`]s from the bus until shut down. Ingestion fetches run
/// on their own tasks so a slow page never holds up resets for other tabs.
pub struct IngestHandle {
    task: JoinHandle<()>,
}

impl IngestHandle {
    pub fn spawn(bus: Arc<InMemoryBus<TabEvent>>, service: SearchResultAdService) -> Self {
        let mut rx = bus.subscribe();
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => handle_event(&service, event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "tab event ingest lagged behind the bus");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("tab event ingest stopped");
        });
        Self { task }
    }

    pub async fn shutdown(self) {
        self.task.abort();
        let _ = self.task.await;
    }
}

fn handle_event(service: &SearchResultAdService, event: TabEvent) {
    match event {
        TabEvent::DocumentLoaded {
            tab,
            url,
            should_trigger,
        } => {
            tokio::spawn(service.maybe_ingest(tab, &url, should_trigger));
        }
        TabEvent::NavigationFinished { tab } => service.on_navigation_finished(&tab),
        TabEvent::TabClosed { tab } => service.on_tab_closed(&tab),
    }
}
