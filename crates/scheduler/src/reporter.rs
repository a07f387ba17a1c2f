use async_trait::async_trait;
use searchads_entities::AdRecord;
use tracing::info;

use crate::model::{AdEventKind, ReportOutcome};

/// The service that records ad events. Calls are serialized by the queue, so
/// implementations never see two concurrent calls from one queue.
#[async_trait]
pub trait AdEventReporter: Send + Sync {
    async fn trigger_ad_event(&self, ad: AdRecord, kind: AdEventKind) -> ReportOutcome;
}

/// Reporter that only logs. Used by the CLI replay command.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingReporter;

#[async_trait]
impl AdEventReporter for LoggingReporter {
    async fn trigger_ad_event(&self, ad: AdRecord, kind: AdEventKind) -> ReportOutcome {
        info!(
            %kind,
            placement_id = %ad.placement_id,
            creative_instance_id = %ad.creative_instance_id,
            campaign_id = %ad.campaign_id,
            value = ad.value,
            "search result ad event"
        );
        ReportOutcome::succeeded(ad.placement_id)
    }
}
