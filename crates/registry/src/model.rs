use std::time::Instant;

use searchads_core_types::TabId;
use searchads_entities::TabAdMap;
use tokio::sync::oneshot;

/// Proof of one ingestion attempt. Completion is only accepted while the
/// ticket is still the tab's latest attempt.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IngestionTicket {
    pub tab: TabId,
    pub generation: u64,
}

/// A viewed-event request that arrived before the tab's ads were known.
#[derive(Debug)]
pub struct PendingViewedRequest {
    pub creative_instance_id: String,
    pub requested_at: Instant,
    completion: oneshot::Sender<bool>,
}

impl PendingViewedRequest {
    pub fn new(creative_instance_id: impl Into<String>, completion: oneshot::Sender<bool>) -> Self {
        Self {
            creative_instance_id: creative_instance_id.into(),
            requested_at: Instant::now(),
            completion,
        }
    }

    /// Answers the requester. A requester that stopped waiting is ignored.
    pub fn complete(self, event_triggered: bool) {
        let _ = self.completion.send(event_triggered);
    }

    pub fn waited_ms(&self) -> u64 {
        self.requested_at.elapsed().as_millis() as u64
    }
}

/// Outcome of offering a viewed request to the tracker.
#[derive(Debug)]
pub enum Parking {
    /// The tab has no ads yet; the request waits for ingestion.
    Parked,
    /// Ads are known; the caller resolves the request right away.
    Ready(PendingViewedRequest),
}

#[derive(Debug, Default)]
pub(crate) struct TabSlot {
    /// `None` until ingestion completes; an empty map means "no ads".
    pub ads: Option<TabAdMap>,
    pub pending: Vec<PendingViewedRequest>,
    pub in_flight: Option<u64>,
}
