use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use intel_core::{BalanceSheet, CashFlowStatement, Entity, FinancialPeriod, IncomeStatement, KeyMetrics, PeriodType, ProviderResult};
use intel_repository::Repository;
use reqwest::Client;

use crate::rate_limit::DailyBudget;
use crate::{err_result, ok_result, safe_f64, Provider};

const BASE_URL: &str = "https://financialmodelingprep.com/api/v3";
const DAILY_LIMIT: u32 = 250;

/// Financial Modeling Prep: quarterly statements plus profile/ratio
/// enrichment used by the snapshot gap-fill chain.
pub struct FmpProvider {
    api_key: String,
    client: Client,
    repo: Arc<dyn Repository>,
    budget: DailyBudget,
}

impl FmpProvider {
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

    async fn get_array(&self, path: &str, ticker: &str, extra: &[(&str, &str)]) -> Option<Vec<serde_json::Value>> {
        let url = format!("{BASE_URL}/{path}/{ticker}");
        let mut query: Vec<(&str, &str)> = vec![("apikey", &self.api_key)];
        query.extend_from_slice(extra);
        let resp = self.client.get(&url).query(&query).send().await.ok()?;
        if !resp.status().is_success() {
            return None;
        }
        resp.json().await.ok()
    }

    pub async fn fetch_profile(&self, ticker: &str) -> Option<serde_json::Value> {
        self.get_array("profile", ticker, &[]).await?.into_iter().next()
    }

    pub async fn fetch_ratios_ttm(&self, ticker: &str) -> Option<serde_json::Value> {
        self.get_array("ratios-ttm", ticker, &[]).await?.into_iter().next()
    }

    fn field(entry: &serde_json::Value, key: &str) -> Option<f64> {
        entry.get(key).and_then(safe_f64)
    }

    fn put_extra(extra: &mut std::collections::BTreeMap<String, f64>, row: &serde_json::Value, key: &str, extra_name: &str) {
        if let Some(v) = Self::field(row, key) {
            extra.insert(extra_name.to_string(), v);
        }
    }

    async fn fetch_income(&self, ticker: &str) -> Vec<(String, IncomeStatement)> {
        let Some(rows) = self.get_array("income-statement", ticker, &[("period", "quarter"), ("limit", "20")]).await else {
            return Vec::new();
        };
        rows.into_iter()
            .filter_map(|row| {
                let date = row.get("date")?.as_str()?.to_string();
                let mut extra = std::collections::BTreeMap::new();
                Self::put_extra(&mut extra, &row, "costOfRevenue", "cost_of_revenue");
                Self::put_extra(&mut extra, &row, "grossProfitRatio", "gross_margin");
                Self::put_extra(&mut extra, &row, "operatingIncomeRatio", "operating_margin");
                Self::put_extra(&mut extra, &row, "netIncomeRatio", "net_margin");
                Self::put_extra(&mut extra, &row, "epsdiluted", "eps_diluted");
                Self::put_extra(&mut extra, &row, "researchAndDevelopmentExpenses", "research_and_development");
                Self::put_extra(&mut extra, &row, "sellingGeneralAndAdministrativeExpenses", "sga_expenses");
                Self::put_extra(&mut extra, &row, "ebitdaratio", "ebitda_margin");
                let stmt = IncomeStatement {
                    revenue: Self::field(&row, "revenue"),
                    gross_profit: Self::field(&row, "grossProfit"),
                    operating_income: Self::field(&row, "operatingIncome"),
                    net_income: Self::field(&row, "netIncome"),
                    eps: Self::field(&row, "eps"),
                    ebitda: Self::field(&row, "ebitda"),
                    extra,
                };
                Some((date, stmt))
            })
            .collect()
    }

    async fn fetch_balance(&self, ticker: &str) -> Vec<(String, BalanceSheet)> {
        let Some(rows) = self.get_array("balance-sheet-statement", ticker, &[("period", "quarter"), ("limit", "20")]).await else {
            return Vec::new();
        };
        rows.into_iter()
            .filter_map(|row| {
                let date = row.get("date")?.as_str()?.to_string();
                let mut extra = std::collections::BTreeMap::new();
                Self::put_extra(&mut extra, &row, "totalCurrentAssets", "total_current_assets");
                Self::put_extra(&mut extra, &row, "totalCurrentLiabilities", "total_current_liabilities");
                Self::put_extra(&mut extra, &row, "longTermDebt", "long_term_debt");
                Self::put_extra(&mut extra, &row, "netDebt", "net_debt");
                Self::put_extra(&mut extra, &row, "goodwill", "goodwill");
                Self::put_extra(&mut extra, &row, "inventory", "inventory");
                Self::put_extra(&mut extra, &row, "netReceivables", "net_receivables");
                Self::put_extra(&mut extra, &row, "propertyPlantEquipmentNet", "property_plant_equipment");
                let stmt = BalanceSheet {
                    total_assets: Self::field(&row, "totalAssets"),
                    total_liabilities: Self::field(&row, "totalLiabilities"),
                    shareholders_equity: Self::field(&row, "totalStockholdersEquity"),
                    cash_and_equivalents: Self::field(&row, "cashAndCashEquivalents"),
                    total_debt: Self::field(&row, "totalDebt"),
                    extra,
                };
                Some((date, stmt))
            })
            .collect()
    }

    async fn fetch_cashflow(&self, ticker: &str) -> Vec<(String, CashFlowStatement)> {
        let Some(rows) = self.get_array("cash-flow-statement", ticker, &[("period", "quarter"), ("limit", "20")]).await else {
            return Vec::new();
        };
        rows.into_iter()
            .filter_map(|row| {
                let date = row.get("date")?.as_str()?.to_string();
                let mut extra = std::collections::BTreeMap::new();
                Self::put_extra(&mut extra, &row, "freeCashFlow", "free_cash_flow");
                Self::put_extra(&mut extra, &row, "dividendsPaid", "dividends_paid");
                Self::put_extra(&mut extra, &row, "commonStockRepurchased", "stock_repurchased");
                Self::put_extra(&mut extra, &row, "depreciationAndAmortization", "depreciation_and_amortization");
                let stmt = CashFlowStatement {
                    operating: Self::field(&row, "operatingCashFlow"),
                    capital_expenditure: Self::field(&row, "capitalExpenditure"),
                    investing: Self::field(&row, "netCashUsedForInvestingActivites"),
                    financing: Self::field(&row, "netCashUsedProvidedByFinancingActivities"),
                    extra,
                };
                Some((date, stmt))
            })
            .collect()
    }

    async fn fetch_key_metrics(&self, ticker: &str) -> Vec<(String, KeyMetrics)> {
        let Some(rows) = self.get_array("key-metrics", ticker, &[("period", "quarter"), ("limit", "20")]).await else {
            return Vec::new();
        };
        rows.into_iter()
            .filter_map(|row| {
                let date = row.get("date")?.as_str()?.to_string();
                let mut extra = std::collections::BTreeMap::new();
                Self::put_extra(&mut extra, &row, "revenuePerShare", "revenue_per_share");
                Self::put_extra(&mut extra, &row, "netIncomePerShare", "net_income_per_share");
                Self::put_extra(&mut extra, &row, "operatingCashFlowPerShare", "operating_cash_flow_per_share");
                Self::put_extra(&mut extra, &row, "freeCashFlowPerShare", "free_cash_flow_per_share");
                Self::put_extra(&mut extra, &row, "priceToSalesRatio", "price_to_sales_ratio");
                Self::put_extra(&mut extra, &row, "pbRatio", "pb_ratio");
                Self::put_extra(&mut extra, &row, "enterpriseValueOverEBITDA", "ev_to_ebitda");
                Self::put_extra(&mut extra, &row, "roe", "roe");
                Self::put_extra(&mut extra, &row, "returnOnTangibleAssets", "roa");
                Self::put_extra(&mut extra, &row, "payoutRatio", "payout_ratio");
                let stmt = KeyMetrics {
                    pe_ratio: Self::field(&row, "peRatio"),
                    peg_ratio: None,
                    debt_to_equity: Self::field(&row, "debtToEquity"),
                    current_ratio: Self::field(&row, "currentRatio"),
                    dividend_yield: Self::field(&row, "dividendYield"),
                    extra,
                };
                Some((date, stmt))
            })
            .collect()
    }

    async fn store_all(&self, entity: &Entity) -> i64 {
        let ticker = &entity.ticker;
        let (income, balance, cashflow, metrics) = tokio::join!(
            self.fetch_income(ticker),
            self.fetch_balance(ticker),
            self.fetch_cashflow(ticker),
            self.fetch_key_metrics(ticker),
        );

        use std::collections::BTreeMap;
        let mut by_date: BTreeMap<String, (IncomeStatement, BalanceSheet, CashFlowStatement, KeyMetrics)> = BTreeMap::new();
        for (date, stmt) in income {
            by_date.entry(date).or_default().0 = stmt;
        }
        for (date, stmt) in balance {
            by_date.entry(date).or_default().1 = stmt;
        }
        for (date, stmt) in cashflow {
            by_date.entry(date).or_default().2 = stmt;
        }
        for (date, stmt) in metrics {
            by_date.entry(date).or_default().3 = stmt;
        }

        let mut stored = 0i64;
        for (date, (income, balance, cash_flow, key_metrics)) in by_date {
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
                source_provider: "fmp".to_string(),
                income,
                balance,
                cash_flow,
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
impl Provider for FmpProvider {
    fn name(&self) -> &str {
        "fmp"
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn rate_limit_ok(&self) -> bool {
        self.budget.ok()
    }

    async fn fetch_company_data(&self, entity: &Entity) -> Vec<ProviderResult> {
        if !self.is_configured() {
            return vec![err_result("fmp", "financials", "no API key configured")];
        }
        if !self.budget.ok() {
            return vec![err_result("fmp", "financials", "daily call budget exhausted")];
        }
        self.budget.record_call();
        self.budget.record_call();
        self.budget.record_call();
        self.budget.record_call();
        let stored = self.store_all(entity).await;
        if stored > 0 {
            vec![ok_result("fmp", "financials", stored)]
        } else {
            vec![err_result("fmp", "financials", "no statement rows returned")]
        }
    }
}
