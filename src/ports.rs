//! Collaborators the service depends on but does not implement.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use url::Url;

use searchads_core_types::TabId;
use searchads_entities::WebPage;

/// Fetches the structured-data document of a committed page.
#[async_trait]
pub trait PageMetadataSource: Send + Sync {
    /// `None` when the page has no document or the fetch failed.
    async fn fetch_page_entities(&self, tab: &TabId) -> Option<WebPage>;
}

/// Host-side switches consulted before ingesting or answering viewed requests.
pub trait ReportingGate: Send + Sync {
    fn is_reporting_enabled(&self) -> bool;

    fn is_request_allowed_for_host(&self, url: &Url) -> bool;

    fn confirmation_events_enabled(&self) -> bool {
        true
    }
}

/// Serves documents registered ahead of time. Tabs without a document fetch
/// `None`.
#[derive(Debug, Default)]
pub struct StaticMetadataSource {
    pages: Mutex<HashMap<TabId, WebPage>>,
}

impl StaticMetadataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, tab: TabId, page: WebPage) {
        self.pages.lock().insert(tab, page);
    }
}

#[async_trait]
impl PageMetadataSource for StaticMetadataSource {
    async fn fetch_page_entities(&self, tab: &TabId) -> Option<WebPage> {
        self.pages.lock().get(tab).cloned()
    }
}
