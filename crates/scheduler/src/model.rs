use std::fmt;
use std::time::{Duration, Instant};

use searchads_entities::AdRecord;

/// Ad event kinds understood by the reporting service. This pipeline only
/// ever sends `Viewed`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum AdEventKind {
    Served,
    Viewed,
    Clicked,
}

impl fmt::Display for AdEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AdEventKind::Served => "served",
            AdEventKind::Viewed => "viewed",
            AdEventKind::Clicked => "clicked",
        };
        f.write_str(name)
    }
}

/// Continuation payload of one reporter call.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReportOutcome {
    pub success: bool,
    pub placement_id: String,
}

impl ReportOutcome {
    pub fn succeeded(placement_id: impl Into<String>) -> Self {
        Self {
            success: true,
            placement_id: placement_id.into(),
        }
    }

    pub fn failed(placement_id: impl Into<String>) -> Self {
        Self {
            success: false,
            placement_id: placement_id.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum QueueStatus {
    Idle,
    Dispatching,
}

/// An ad moved out of its tab map, waiting for its viewed confirmation.
#[derive(Clone, Debug)]
pub struct DispatchEntry {
    pub seq: u64,
    pub ad: AdRecord,
    pub enqueued_at: Instant,
}

impl DispatchEntry {
    pub fn new(seq: u64, ad: AdRecord) -> Self {
        Self {
            seq,
            ad,
            enqueued_at: Instant::now(),
        }
    }

    pub fn wait_ms(&self) -> u64 {
        self.enqueued_at.elapsed().as_millis() as u64
    }
}

#[derive(Clone, Debug)]
pub struct DispatchConfig {
    /// A reporter call running longer than this counts as failed.
    pub report_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            report_timeout: Duration::from_secs(30),
        }
    }
}
