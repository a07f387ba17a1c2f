pub mod error;
pub mod metrics;
pub mod model;
pub mod queue;
pub mod reporter;
pub mod stack;

pub use model::{AdEventKind, DispatchConfig, QueueStatus, ReportOutcome};
pub use queue::{DispatchSection, ViewedEventQueue};
pub use reporter::{AdEventReporter, LoggingReporter};
