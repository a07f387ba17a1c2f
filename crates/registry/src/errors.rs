use searchads_core_types::{AdsError, TabId};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The tab was reset or re-ingested after this attempt started.
    #[error("stale ingestion ticket {generation} for tab {tab}")]
    StaleTicket { tab: TabId, generation: u64 },
}

impl From<RegistryError> for AdsError {
    fn from(value: RegistryError) -> Self {
        AdsError::new(value.to_string())
    }
}
