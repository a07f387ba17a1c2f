//! Search result ad pipeline: ingests ad metadata from search result pages and
//! confirms viewed ads through a single-flight dispatch queue.

pub mod gate;
pub mod ingest;
pub mod metrics;
pub mod ports;
pub mod service;

pub use gate::PolicyGate;
pub use ingest::{IngestHandle, TabEvent};
pub use ports::{PageMetadataSource, ReportingGate, StaticMetadataSource};
pub use service::{SearchResultAdService, ServiceConfig};
