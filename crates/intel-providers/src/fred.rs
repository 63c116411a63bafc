use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use intel_core::{Entity, MacroObservation, ProviderResult};
use intel_repository::Repository;
use reqwest::Client;

use crate::{err_result, ok_result, Provider};

pub const CORE_SERIES: &[(&str, &str)] = &[
    ("GDP", "Gross Domestic Product"),
    ("CPIAUCSL", "Consumer Price Index"),
    ("UNRATE", "Unemployment Rate"),
    ("DFF", "Federal Funds Effective Rate"),
    ("T10YIE", "10-Year Breakeven Inflation Rate"),
    ("VIXCLS", "CBOE Volatility Index"),
    ("SP500", "S&P 500"),
    ("DTWEXBGS", "Trade Weighted U.S. Dollar Index"),
    ("DGS10", "10-Year Treasury Constant Maturity Rate"),
    ("DGS2", "2-Year Treasury Constant Maturity Rate"),
    ("FEDFUNDS", "Federal Funds Effective Rate (Monthly)"),
    ("MORTGAGE30US", "30-Year Fixed Rate Mortgage Average"),
];

/// FRED macro series. Company-agnostic: `fetch_company_data` ignores the
/// entity and refreshes the same core series set on every call.
pub struct FredProvider {
    api_key: String,
    client: Client,
    repo: Arc<dyn Repository>,
}

impl FredProvider {
    pub fn new(api_key: String, repo: Arc<dyn Repository>) -> Self {
        Self {
            api_key,
            client: Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .unwrap_or_else(|_| Client::new()),
            repo,
        }
    }

    async fn fetch_series(&self, series_id: &str, series_name: &str) -> i64 {
        let start = (Utc::now() - ChronoDuration::days(730)).date_naive();
        let resp = self
            .client
            .get("https://api.stlouisfed.org/fred/series/observations")
            .query(&[
                ("series_id", series_id),
                ("api_key", &self.api_key),
                ("file_type", "json"),
                ("observation_start", &start.to_string()),
                ("sort_order", "desc"),
            ])
            .send()
            .await;

        let Ok(resp) = resp else { return 0 };
        if !resp.status().is_success() {
            return 0;
        }
        let Ok(body) = resp.json::<serde_json::Value>().await else { return 0 };
        let Some(observations) = body.get("observations").and_then(|v| v.as_array()) else { return 0 };

        let mut stored = 0i64;
        for obs in observations {
            let raw_value = obs.get("value").and_then(|v| v.as_str()).unwrap_or(".");
            if raw_value.trim().is_empty() || raw_value == "." {
                continue;
            }
            let Ok(value) = raw_value.parse::<f64>() else { continue };
            let Some(date_str) = obs.get("date").and_then(|v| v.as_str()) else { continue };
            let Ok(date) = date_str.parse() else { continue };

            let observation = MacroObservation {
                series_id: series_id.to_string(),
                series_name: series_name.to_string(),
                date,
                value,
            };
            if self.repo.upsert_macro(&observation).await.is_ok() {
                stored += 1;
            }
        }
        stored
    }

    pub async fn fetch_all_core_series(&self) -> i64 {
        let mut total = 0i64;
        for (series_id, series_name) in CORE_SERIES {
            total += self.fetch_series(series_id, series_name).await;
        }
        total
    }
}

#[async_trait]
impl Provider for FredProvider {
    fn name(&self) -> &str {
        "fred"
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn rate_limit_ok(&self) -> bool {
        true
    }

    async fn fetch_company_data(&self, _entity: &Entity) -> Vec<ProviderResult> {
        if !self.is_configured() {
            return vec![err_result("fred", "macro", "no API key configured")];
        }
        let stored = self.fetch_all_core_series().await;
        if stored > 0 {
            vec![ok_result("fred", "macro", stored)]
        } else {
            vec![err_result("fred", "macro", "no observations returned")]
        }
    }
}
