use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use searchads_core_types::TabId;
use searchads_entities::{AdRecord, TabAdMap};

use crate::{
    errors::RegistryError,
    metrics,
    model::{IngestionTicket, Parking, PendingViewedRequest, TabSlot},
};

/// Ad session state of every tab: the validated ads once ingestion has run,
/// plus the viewed requests that are still waiting for it.
#[derive(Debug, Default)]
pub struct TabSessions {
    tabs: DashMap<TabId, TabSlot>,
    generation: AtomicU64,
}

impl TabSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a new ingestion attempt for `tab`. Any earlier attempt still in
    /// flight becomes stale. Existing ads are left untouched.
    pub fn begin_ingestion(&self, tab: &TabId) -> IngestionTicket {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        self.tabs.entry(tab.clone()).or_default().in_flight = Some(generation);
        metrics::set_tab_count(self.tabs.len());
        IngestionTicket {
            tab: tab.clone(),
            generation,
        }
    }

    /// Stores `ads` for the ticket's tab, replacing any earlier map, and hands
    /// back the requests that were waiting so the caller can resolve them.
    pub fn complete_ingestion(
        &self,
        ticket: &IngestionTicket,
        ads: TabAdMap,
    ) -> Result<Vec<PendingViewedRequest>, RegistryError> {
        let stale = || RegistryError::StaleTicket {
            tab: ticket.tab.clone(),
            generation: ticket.generation,
        };
        let mut slot = match self.tabs.get_mut(&ticket.tab) {
            Some(slot) if slot.in_flight == Some(ticket.generation) => slot,
            _ => {
                metrics::record_stale_completion();
                return Err(stale());
            }
        };
        slot.in_flight = None;
        metrics::record_ads_stored(ads.len());
        slot.ads = Some(ads);
        let pending = mem::take(&mut slot.pending);
        drop(slot);

        metrics::pending_released(pending.len());
        debug!(
            tab = %ticket.tab,
            pending = pending.len(),
            "search result ad ingestion stored"
        );
        Ok(pending)
    }

    /// Parks `request` when the tab's ads are not known yet, otherwise gives it
    /// back for immediate resolution.
    pub fn park_viewed_request(&self, tab: &TabId, request: PendingViewedRequest) -> Parking {
        let mut slot = self.tabs.entry(tab.clone()).or_default();
        if slot.ads.is_some() {
            return Parking::Ready(request);
        }
        debug!(
            %tab,
            creative_instance_id = %request.creative_instance_id,
            "viewed event request waits for ingestion"
        );
        slot.pending.push(request);
        drop(slot);
        metrics::pending_parked();
        metrics::set_tab_count(self.tabs.len());
        Parking::Parked
    }

    /// Removes the ad from the tab's map. Each ad can be taken once.
    pub fn take_ad(&self, tab: &TabId, creative_instance_id: &str) -> Option<AdRecord> {
        self.tabs
            .get_mut(tab)?
            .ads
            .as_mut()?
            .remove(creative_instance_id)
    }

    /// Forgets everything about `tab`. Waiting requests are dropped without an
    /// answer; returns how many were abandoned.
    pub fn reset(&self, tab: &TabId) -> usize {
        let abandoned = match self.tabs.entry(tab.clone()) {
            Entry::Occupied(entry) => entry.remove().pending.len(),
            Entry::Vacant(_) => return 0,
        };
        metrics::set_tab_count(self.tabs.len());
        if abandoned > 0 {
            metrics::pending_released(abandoned);
            metrics::record_abandoned(abandoned);
            debug!(%tab, abandoned, "dropped pending viewed event requests");
        }
        abandoned
    }

    pub fn has_ads(&self, tab: &TabId) -> bool {
        self.tabs
            .get(tab)
            .map(|slot| slot.ads.is_some())
            .unwrap_or(false)
    }

    pub fn ad_count(&self, tab: &TabId) -> Option<usize> {
        self.tabs.get(tab)?.ads.as_ref().map(|ads| ads.len())
    }

    pub fn contains_ad(&self, tab: &TabId, creative_instance_id: &str) -> bool {
        self.tabs
            .get(tab)
            .and_then(|slot| {
                slot.ads
                    .as_ref()
                    .map(|ads| ads.contains_key(creative_instance_id))
            })
            .unwrap_or(false)
    }

    pub fn pending_count(&self, tab: &TabId) -> usize {
        self.tabs.get(tab).map(|slot| slot.pending.len()).unwrap_or(0)
    }

    pub fn tab_count(&self) -> usize {
        self.tabs.len()
    }
}
