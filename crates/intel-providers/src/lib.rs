//! Provider framework (C3): an abstract contract for structured-data
//! providers, a per-provider daily rate budget, and the dispatch logic that
//! fans a resolved entity out to every configured provider.

mod alpha_vantage;
mod cboe;
mod ddg;
mod discovery;
mod finra;
mod finviz;
mod fmp;
mod fred;
mod polygon;
mod rate_limit;
mod reddit;
mod sec_edgar;
mod snapshot;

pub mod dispatch;

pub use alpha_vantage::AlphaVantageProvider;
pub use cboe::CboeProvider;
pub use ddg::DdgProvider;
pub use discovery::discover_query_sources;
pub use finra::FinraProvider;
pub use finviz::FinvizProvider;
pub use fmp::FmpProvider;
pub use fred::{FredProvider, CORE_SERIES};
pub use polygon::PolygonProvider;
pub use rate_limit::DailyBudget;
pub use reddit::RedditProvider;
pub use sec_edgar::SecEdgarProvider;
pub use snapshot::{fetch_financial_snapshot, fetch_price_history, FinancialSnapshot, PriceHistory};

use async_trait::async_trait;
use intel_core::{Entity, ProviderResult};

/// Contract every structured-data provider implements. Connector-style
/// sources (RSS/web discovery) are handled separately in `discovery` since
/// they carry no rate budget and produce `Source` rows, not `ProviderResult`s.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;
    fn is_configured(&self) -> bool;
    fn rate_limit_ok(&self) -> bool;
    async fn fetch_company_data(&self, entity: &Entity) -> Vec<ProviderResult>;
}

fn ok_result(provider: &str, data_type: &str, records_stored: i64) -> ProviderResult {
    ProviderResult {
        provider: provider.to_string(),
        data_type: data_type.to_string(),
        records_stored,
        success: records_stored > 0,
        error: None,
        fetched_at: chrono::Utc::now(),
    }
}

fn err_result(provider: &str, data_type: &str, error: impl Into<String>) -> ProviderResult {
    ProviderResult {
        provider: provider.to_string(),
        data_type: data_type.to_string(),
        records_stored: 0,
        success: false,
        error: Some(error.into()),
        fetched_at: chrono::Utc::now(),
    }
}

fn safe_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}
