pub mod backfill;
pub mod coverage;
pub mod filings;
pub mod financial_performance;
pub mod historical_trends;
pub mod macro_context;
pub mod scenarios;
pub mod social_sentiment;
pub mod validation;

pub use backfill::{FmpBackfillProvider, QuarterlyBackfillProvider, StubBackfillProvider};
pub use coverage::build_coverage_assessment;
pub use filings::build_filings_summary;
pub use financial_performance::build_financial_performance;
pub use historical_trends::build_historical_trends;
pub use macro_context::build_macro_context;
pub use scenarios::{build_scenarios, resolve_scenarios};
pub use social_sentiment::build_social_sentiment;
pub use validation::validate_financial_snapshot;
