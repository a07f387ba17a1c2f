use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("reporter rejected ad event for placement {0}")]
    Rejected(String),
    #[error("reporter did not answer within {0:?}")]
    TimedOut(Duration),
}

impl From<SchedulerError> for searchads_core_types::AdsError {
    fn from(value: SchedulerError) -> Self {
        searchads_core_types::AdsError::new(value.to_string())
    }
}
