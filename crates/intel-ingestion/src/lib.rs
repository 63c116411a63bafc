pub mod analyst;
pub mod connectors;
pub mod critic;
pub mod job;
pub mod pii;
pub mod pipeline;
pub mod policy;
pub mod processing;
pub mod tracker;

pub use connectors::{get_connector, Connector, RssConnector, WebConnector};
pub use job::IngestJob;
pub use pipeline::{execute_ingest, IngestOutcome, IngestStatus};
pub use policy::{validate_source_policy, PolicyDecision};
