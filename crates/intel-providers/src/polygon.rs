use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use intel_core::{BalanceSheet, CashFlowStatement, Entity, FinancialPeriod, IncomeStatement, KeyMetrics, PeriodType, ProviderResult};
use intel_repository::Repository;
use reqwest::Client;

use crate::rate_limit::DailyBudget;
use crate::{err_result, ok_result, Provider};

const DAILY_LIMIT: u32 = 5;

fn extract_val(section: &serde_json::Value, key: &str) -> Option<f64> {
    section.get(key)?.get("value")?.as_f64()
}

/// Polygon.io reference financials, a single quarterly-statements endpoint.
pub struct PolygonProvider {
    api_key: String,
    client: Client,
    repo: Arc<dyn Repository>,
    budget: DailyBudget,
}

impl PolygonProvider {
    pub fn new(api_key: String, repo: Arc<dyn Repository>) -> Self {
        Self {
            api_key,
            client: Client::builder()
                .timeout(Duration::from_secs(20))
                .build()
                .unwrap_or_else(|_| Client::new()),
            repo,
            budget: DailyBudget::new(DAILY_LIMIT),
        }
    }

    async fn fetch(&self, ticker: &str) -> Option<Vec<serde_json::Value>> {
        let resp = self
            .client
            .get("https://api.polygon.io/vX/reference/financials")
            .query(&[
                ("ticker", ticker),
                ("timeframe", "quarterly"),
                ("limit", "4"),
                ("apiKey", &self.api_key),
            ])
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let body: serde_json::Value = resp.json().await.ok()?;
        body.get("results")?.as_array().cloned()
    }

    async fn store(&self, entity: &Entity) -> i64 {
        let Some(results) = self.fetch(&entity.ticker).await else { return 0 };
        let mut stored = 0i64;
        for result in results {
            let Some(date) = result.get("end_date").and_then(|v| v.as_str()) else { continue };
            let Ok(period_end) = date.parse() else { continue };
            let fiscal_year = date.get(0..4).and_then(|y| y.parse().ok()).unwrap_or(0);

            let financials = &result["financials"];
            let income_section = &financials["income_statement"];
            let balance_section = &financials["balance_sheet"];
            let cashflow_section = &financials["cash_flow_statement"];

            let income = IncomeStatement {
                revenue: extract_val(income_section, "revenues"),
                gross_profit: extract_val(income_section, "gross_profit"),
                operating_income: extract_val(income_section, "operating_income_loss"),
                net_income: extract_val(income_section, "net_income_loss"),
                ..Default::default()
            };
            let balance = BalanceSheet {
                total_assets: extract_val(balance_section, "assets"),
                total_liabilities: extract_val(balance_section, "liabilities"),
                shareholders_equity: extract_val(balance_section, "equity"),
                ..Default::default()
            };
            let cash_flow = CashFlowStatement {
                operating: extract_val(cashflow_section, "net_cash_flow_from_operating_activities"),
                ..Default::default()
            };

            if income.is_empty() && balance.is_empty() && cash_flow.is_empty() {
                continue;
            }

            let period = FinancialPeriod {
                id: None,
                entity_id: Some(entity.id),
                ticker: entity.ticker.clone(),
                period_type: PeriodType::Quarterly,
                period_end,
                fiscal_year,
                fiscal_quarter: None,
                source_provider: "polygon".to_string(),
                income,
                balance,
                cash_flow,
                key_metrics: KeyMetrics::default(),
            };
            if self.repo.upsert_financial_period(&period).await.is_ok() {
                stored += 1;
            }
        }
        stored
    }
}

#[async_trait]
impl Provider for PolygonProvider {
    fn name(&self) -> &str {
        "polygon"
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn rate_limit_ok(&self) -> bool {
        self.budget.ok()
    }

    async fn fetch_company_data(&self, entity: &Entity) -> Vec<ProviderResult> {
        if !self.is_configured() {
            return vec![err_result("polygon", "financials", "no API key configured")];
        }
        if !self.budget.ok() {
            return vec![err_result("polygon", "financials", "daily call budget exhausted")];
        }
        self.budget.record_call();
        let stored = self.store(entity).await;
        if stored > 0 {
            vec![ok_result("polygon", "financials", stored)]
        } else {
            vec![err_result("polygon", "financials", "no statement rows returned")]
        }
    }
}
