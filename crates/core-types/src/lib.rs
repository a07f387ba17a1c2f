use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// Shared error type for the ad pipeline crates.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdsError {
    #[error("{message}")]
    Message { message: String },
    /// The tab was reset before the pending request could be answered.
    #[error("viewed event request abandoned for tab {0}")]
    Abandoned(TabId),
}

impl AdsError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

/// Opaque handle for one committed page load in one browser tab.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct TabId(pub String);

impl TabId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for TabId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for TabId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
