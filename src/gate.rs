use std::sync::Arc;

use tokio::sync::watch;
use url::Url;

use searchads_policy_center::{PolicySnapshot, PolicyView};

use crate::ports::ReportingGate;

/// Answers gate questions from the newest policy snapshot. Runtime overrides
/// applied to the policy center show up on the next call.
pub struct PolicyGate {
    rx: watch::Receiver<Arc<PolicySnapshot>>,
}

impl PolicyGate {
    pub fn new(rx: watch::Receiver<Arc<PolicySnapshot>>) -> Self {
        Self { rx }
    }

    /// Gate pinned to one snapshot.
    pub fn fixed(snapshot: PolicySnapshot) -> Self {
        let (tx, rx) = watch::channel(Arc::new(snapshot));
        // The receiver keeps the last value after the sender is gone.
        drop(tx);
        Self { rx }
    }

    pub fn view(&self) -> PolicyView {
        self.rx.borrow().view()
    }
}

impl ReportingGate for PolicyGate {
    fn is_reporting_enabled(&self) -> bool {
        self.view().is_reporting_enabled()
    }

    fn is_request_allowed_for_host(&self, url: &Url) -> bool {
        self.view().is_allowed_host(url)
    }

    fn confirmation_events_enabled(&self) -> bool {
        self.rx.borrow().features.search_result_ad_confirmation_events
    }
}
