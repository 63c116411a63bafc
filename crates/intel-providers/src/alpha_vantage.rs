use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use intel_core::{BalanceSheet, CashFlowStatement, Entity, FinancialPeriod, IncomeStatement, KeyMetrics, PeriodType, ProviderResult};
use intel_repository::Repository;
use reqwest::Client;

use crate::rate_limit::DailyBudget;
use crate::{err_result, ok_result, safe_f64, Provider};

const BASE_URL: &str = "https://www.alphavantage.co/query";
const DAILY_LIMIT: u32 = 25;

/// Alpha Vantage: function-based API, keyed by `fiscalDateEnding`. Detects
/// rate limiting through response body fields rather than HTTP status.
pub struct AlphaVantageProvider {
    api_key: String,
    client: Client,
    repo: Arc<dyn Repository>,
    budget: DailyBudget,
}

impl AlphaVantageProvider {
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

    async fn call(&self, function: &str, ticker: &str) -> Option<serde_json::Value> {
        let resp = self
            .client
            .get(BASE_URL)
            .query(&[("function", function), ("symbol", ticker), ("apikey", &self.api_key)])
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let data: serde_json::Value = resp.json().await.ok()?;
        if data.get("Error Message").is_some() || data.get("Note").is_some() {
            return None;
        }
        Some(data)
    }

    fn field(row: &serde_json::Value, key: &str) -> Option<f64> {
        row.get(key).and_then(safe_f64)
    }

    async fn store_income_balance_cashflow(&self, entity: &Entity) -> i64 {
        let ticker = &entity.ticker;
        let (income_doc, balance_doc, cashflow_doc) = tokio::join!(
            self.call("INCOME_STATEMENT", ticker),
            self.call("BALANCE_SHEET", ticker),
            self.call("CASH_FLOW", ticker),
        );

        let mut by_date: BTreeMap<String, (IncomeStatement, BalanceSheet, CashFlowStatement)> = BTreeMap::new();

        if let Some(doc) = &income_doc {
            if let Some(rows) = doc.get("quarterlyReports").and_then(|v| v.as_array()) {
                for row in rows {
                    let Some(date) = row.get("fiscalDateEnding").and_then(|v| v.as_str()) else { continue };
                    let mut extra = BTreeMap::new();
                    if let Some(v) = Self::field(row, "costOfRevenue") {
                        extra.insert("cost_of_revenue".to_string(), v);
                    }
                    if let Some(v) = Self::field(row, "researchAndDevelopment") {
                        extra.insert("research_and_development".to_string(), v);
                    }
                    let stmt = IncomeStatement {
                        revenue: Self::field(row, "totalRevenue"),
                        gross_profit: Self::field(row, "grossProfit"),
                        operating_income: Self::field(row, "operatingIncome"),
                        net_income: Self::field(row, "netIncome"),
                        eps: None,
                        ebitda: Self::field(row, "ebitda"),
                        extra,
                    };
                    by_date.entry(date.to_string()).or_default().0 = stmt;
                }
            }
        }

        if let Some(doc) = &balance_doc {
            if let Some(rows) = doc.get("quarterlyReports").and_then(|v| v.as_array()) {
                for row in rows {
                    let Some(date) = row.get("fiscalDateEnding").and_then(|v| v.as_str()) else { continue };
                    let mut extra = BTreeMap::new();
                    if let Some(v) = Self::field(row, "totalCurrentAssets") {
                        extra.insert("total_current_assets".to_string(), v);
                    }
                    if let Some(v) = Self::field(row, "totalCurrentLiabilities") {
                        extra.insert("total_current_liabilities".to_string(), v);
                    }
                    let stmt = BalanceSheet {
                        total_assets: Self::field(row, "totalAssets"),
                        total_liabilities: Self::field(row, "totalLiabilities"),
                        shareholders_equity: Self::field(row, "totalShareholderEquity"),
                        cash_and_equivalents: Self::field(row, "cashAndCashEquivalentsAtCarryingValue"),
                        total_debt: Self::field(row, "longTermDebt"),
                        extra,
                    };
                    by_date.entry(date.to_string()).or_default().1 = stmt;
                }
            }
        }

        if let Some(doc) = &cashflow_doc {
            if let Some(rows) = doc.get("quarterlyReports").and_then(|v| v.as_array()) {
                for row in rows {
                    let Some(date) = row.get("fiscalDateEnding").and_then(|v| v.as_str()) else { continue };
                    let mut extra = BTreeMap::new();
                    if let Some(v) = Self::field(row, "dividendPayout") {
                        extra.insert("dividends_paid".to_string(), v);
                    }
                    let stmt = CashFlowStatement {
                        operating: Self::field(row, "operatingCashflow"),
                        capital_expenditure: Self::field(row, "capitalExpenditures"),
                        investing: Self::field(row, "cashflowFromInvestment"),
                        financing: Self::field(row, "cashflowFromFinancing"),
                        extra,
                    };
                    by_date.entry(date.to_string()).or_default().2 = stmt;
                }
            }
        }

        let mut stored = 0i64;
        for (date, (income, balance, cash_flow)) in by_date {
            let Ok(period_end) = date.parse() else { continue };
            let fiscal_year = date.get(0..4).and_then(|y| y.parse().ok()).unwrap_or(0);
            let period = FinancialPeriod {
                id: None,
                entity_id: Some(entity.id),
                ticker: ticker.clone(),
                period_type: PeriodType::Quarterly,
                period_end,
                fiscal_year,
                fiscal_quarter: None,
                source_provider: "alpha_vantage".to_string(),
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

    async fn store_earnings(&self, entity: &Entity) -> i64 {
        let Some(doc) = self.call("EARNINGS", &entity.ticker).await else { return 0 };
        let Some(rows) = doc.get("quarterlyEarnings").and_then(|v| v.as_array()) else { return 0 };

        let mut stored = 0i64;
        for row in rows {
            let Some(date) = row.get("fiscalDateEnding").and_then(|v| v.as_str()) else { continue };
            let Ok(period_end) = date.parse() else { continue };
            let fiscal_year = date.get(0..4).and_then(|y| y.parse().ok()).unwrap_or(0);

            let mut extra = BTreeMap::new();
            if let Some(v) = Self::field(row, "estimatedEPS") {
                extra.insert("estimated_eps".to_string(), v);
            }
            if let Some(v) = Self::field(row, "surprise") {
                extra.insert("eps_surprise".to_string(), v);
            }
            if let Some(v) = Self::field(row, "surprisePercentage") {
                extra.insert("eps_surprise_percentage".to_string(), v);
            }
            let key_metrics = KeyMetrics { extra, ..Default::default() };

            let period = FinancialPeriod {
                id: None,
                entity_id: Some(entity.id),
                ticker: entity.ticker.clone(),
                period_type: PeriodType::Quarterly,
                period_end,
                fiscal_year,
                fiscal_quarter: None,
                source_provider: "alpha_vantage".to_string(),
                income: IncomeStatement {
                    eps: Self::field(row, "reportedEPS"),
                    ..Default::default()
                },
                balance: BalanceSheet::default(),
                cash_flow: CashFlowStatement::default(),
                key_metrics,
            };
            if self.repo.upsert_financial_period(&period).await.is_ok() {
                stored += 1;
            }
        }
        stored
    }
}

#[async_trait]
impl Provider for AlphaVantageProvider {
    fn name(&self) -> &str {
        "alpha_vantage"
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn rate_limit_ok(&self) -> bool {
        self.budget.ok()
    }

    async fn fetch_company_data(&self, entity: &Entity) -> Vec<ProviderResult> {
        if !self.is_configured() {
            return vec![err_result("alpha_vantage", "financials", "no API key configured")];
        }
        if !self.budget.ok() {
            return vec![err_result("alpha_vantage", "financials", "daily call budget exhausted")];
        }
        self.budget.record_call();
        self.budget.record_call();
        self.budget.record_call();
        self.budget.record_call();

        let statements = self.store_income_balance_cashflow(entity).await;
        let earnings = self.store_earnings(entity).await;
        let total = statements + earnings;
        if total > 0 {
            vec![ok_result("alpha_vantage", "financials", total)]
        } else {
            vec![err_result("alpha_vantage", "financials", "no rows returned")]
        }
    }
}
