use searchads_core_types::AdsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("reload unavailable: {0}")]
    ReloadUnavailable(String),
    #[error("invalid policy: {0}")]
    Invalid(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("unsupported policy path: {0}")]
    UnsupportedPath(String),
    #[error("invalid value: {0}")]
    InvalidValue(String),
}

impl From<PolicyError> for AdsError {
    fn from(value: PolicyError) -> Self {
        AdsError::new(value.to_string())
    }
}
