use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use intel_core::{BalanceSheet, CashFlowStatement, Entity, FinancialPeriod, IncomeStatement, KeyMetrics, PeriodType, ProviderResult};
use intel_repository::Repository;
use reqwest::Client;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;

use crate::{err_result, ok_result, safe_f64, Provider};

const INCOME_TAGS: &[&str] = &[
    "Revenues",
    "RevenueFromContractWithCustomerExcludingAssessedTax",
    "CostOfRevenue",
    "CostOfGoodsAndServicesSold",
    "GrossProfit",
    "OperatingIncomeLoss",
    "NetIncomeLoss",
    "EarningsPerShareBasic",
    "EarningsPerShareDiluted",
];

const BALANCE_TAGS: &[&str] = &[
    "Assets",
    "Liabilities",
    "StockholdersEquity",
    "CashAndCashEquivalentsAtCarryingValue",
    "LongTermDebt",
    "LongTermDebtNoncurrent",
];

const CASHFLOW_TAGS: &[&str] = &[
    "NetCashProvidedByUsedInOperatingActivities",
    "CapitalExpenditure",
];

const TARGET_FORMS: &[&str] = &["10-K", "10-Q", "8-K", "DEF 14A", "S-1"];

struct TagEntry {
    form: String,
    end: String,
    fiscal_year: Option<i32>,
    value: f64,
}

/// SEC EDGAR XBRL + filings provider. No API key, 10 req/sec self-throttled.
pub struct SecEdgarProvider {
    user_agent: String,
    client: Client,
    repo: Arc<dyn Repository>,
    last_request: AsyncMutex<Instant>,
}

impl SecEdgarProvider {
    pub fn new(user_agent: String, repo: Arc<dyn Repository>) -> Self {
        Self {
            user_agent,
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| Client::new()),
            repo,
            last_request: AsyncMutex::new(Instant::now()),
        }
    }

    async fn throttle(&self) {
        let mut last = self.last_request.lock().await;
        let elapsed = last.elapsed();
        let min_spacing = Duration::from_millis(120);
        if elapsed < min_spacing {
            tokio::time::sleep(min_spacing - elapsed).await;
        }
        *last = Instant::now();
    }

    async fn resolve_cik(&self, ticker: &str) -> Option<String> {
        self.throttle().await;
        let resp = self
            .client
            .get("https://www.sec.gov/files/company_tickers.json")
            .header("User-Agent", &self.user_agent)
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let data: serde_json::Value = resp.json().await.ok()?;
        let ticker_upper = ticker.to_uppercase();
        for entry in data.as_object()?.values() {
            if entry.get("ticker")?.as_str()?.to_uppercase() == ticker_upper {
                let cik = entry.get("cik_str")?.as_i64()?;
                return Some(format!("{cik:0>10}"));
            }
        }
        None
    }

    async fn fetch_company_facts(&self, cik: &str) -> Option<serde_json::Value> {
        self.throttle().await;
        let url = format!("https://data.sec.gov/api/xbrl/companyfacts/CIK{cik}.json");
        let resp = self
            .client
            .get(&url)
            .header("User-Agent", &self.user_agent)
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            return None;
        }
        resp.json().await.ok()
    }

    fn extract_tag_entries(facts: &serde_json::Value, tag: &str) -> Vec<TagEntry> {
        let units = facts
            .pointer(&format!("/facts/us-gaap/{tag}/units"))
            .and_then(|v| v.as_object());
        let Some(units) = units else { return Vec::new() };

        let values = units
            .get("USD")
            .or_else(|| units.get("USD/shares"))
            .or_else(|| units.get("shares"))
            .and_then(|v| v.as_array());
        let Some(values) = values else { return Vec::new() };

        values
            .iter()
            .filter_map(|entry| {
                let form = entry.get("form")?.as_str()?.to_string();
                if !TARGET_FORMS[..2].contains(&form.as_str()) {
                    return None;
                }
                let end = entry.get("end")?.as_str()?.to_string();
                let value = safe_f64(entry.get("val")?)?;
                let fiscal_year = end.get(0..4).and_then(|y| y.parse::<i32>().ok());
                Some(TagEntry {
                    form,
                    end,
                    fiscal_year,
                    value,
                })
            })
            .collect()
    }

    fn build_period_map(facts: &serde_json::Value, tags: &[&str]) -> BTreeMap<String, BTreeMap<String, f64>> {
        let mut map: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
        for tag in tags {
            for entry in Self::extract_tag_entries(facts, tag) {
                let period_type = if entry.form == "10-K" { "annual" } else { "quarterly" };
                let key = format!("{period_type}:{}", entry.end);
                let bucket = map.entry(key).or_default();
                bucket.insert("__period_type".to_string(), if period_type == "annual" { 1.0 } else { 0.0 });
                bucket.insert("__fiscal_year".to_string(), entry.fiscal_year.unwrap_or(0) as f64);
                bucket.insert((*tag).to_string(), entry.value);
            }
        }
        map
    }

    async fn store_financials(&self, repo: &dyn Repository, entity: &Entity, facts: &serde_json::Value) -> i64 {
        let income_map = Self::build_period_map(facts, INCOME_TAGS);
        let balance_map = Self::build_period_map(facts, BALANCE_TAGS);
        let cashflow_map = Self::build_period_map(facts, CASHFLOW_TAGS);

        let mut all_keys: Vec<&String> = income_map.keys().chain(balance_map.keys()).chain(cashflow_map.keys()).collect();
        all_keys.sort();
        all_keys.dedup();

        let mut stored = 0i64;
        for key in all_keys {
            let inc = income_map.get(key);
            let bal = balance_map.get(key);
            let cf = cashflow_map.get(key);
            let meta = inc.or(bal).or(cf);
            let Some(meta) = meta else { continue };

            let is_annual = meta.get("__period_type").copied().unwrap_or(0.0) > 0.5;
            let fiscal_year = meta.get("__fiscal_year").copied().unwrap_or(0.0) as i32;
            let Some((_, end_date)) = key.split_once(':') else { continue };
            let Ok(period_end) = end_date.parse() else { continue };

            let mut income = IncomeStatement::default();
            let mut balance = BalanceSheet::default();
            let mut cash_flow = CashFlowStatement::default();

            if let Some(inc) = inc {
                income.revenue = inc.get("Revenues").or_else(|| inc.get("RevenueFromContractWithCustomerExcludingAssessedTax")).copied();
                income.gross_profit = inc.get("GrossProfit").copied();
                income.operating_income = inc.get("OperatingIncomeLoss").copied();
                income.net_income = inc.get("NetIncomeLoss").copied();
                income.eps = inc.get("EarningsPerShareBasic").or_else(|| inc.get("EarningsPerShareDiluted")).copied();
            }
            if let Some(bal) = bal {
                balance.total_assets = bal.get("Assets").copied();
                balance.total_liabilities = bal.get("Liabilities").copied();
                balance.shareholders_equity = bal.get("StockholdersEquity").copied();
                balance.cash_and_equivalents = bal.get("CashAndCashEquivalentsAtCarryingValue").copied();
                balance.total_debt = bal.get("LongTermDebt").or_else(|| bal.get("LongTermDebtNoncurrent")).copied();
            }
            if let Some(cf) = cf {
                cash_flow.operating = cf.get("NetCashProvidedByUsedInOperatingActivities").copied();
                cash_flow.capital_expenditure = cf.get("CapitalExpenditure").copied();
            }

            if income.is_empty() && balance.is_empty() && cash_flow.is_empty() {
                continue;
            }

            let period = FinancialPeriod {
                id: None,
                entity_id: Some(entity.id),
                ticker: entity.ticker.clone(),
                period_type: if is_annual { PeriodType::Annual } else { PeriodType::Quarterly },
                period_end,
                fiscal_year,
                fiscal_quarter: None,
                source_provider: "sec_edgar".to_string(),
                income,
                balance,
                cash_flow,
                key_metrics: KeyMetrics::default(),
            };

            if repo.upsert_financial_period(&period).await.is_ok() {
                stored += 1;
            }
        }
        stored
    }

    async fn fetch_filings(&self, repo: &dyn Repository, cik: &str, entity: &Entity) -> i64 {
        self.throttle().await;
        let url = format!("https://data.sec.gov/submissions/CIK{cik}.json");
        let Ok(resp) = self.client.get(&url).header("User-Agent", &self.user_agent).send().await else {
            return 0;
        };
        if !resp.status().is_success() {
            return 0;
        }
        let Ok(data) = resp.json::<serde_json::Value>().await else { return 0 };

        let recent = &data["filings"]["recent"];
        let forms = recent["form"].as_array().cloned().unwrap_or_default();
        let dates = recent["filingDate"].as_array().cloned().unwrap_or_default();
        let accessions = recent["accessionNumber"].as_array().cloned().unwrap_or_default();
        let docs = recent["primaryDocument"].as_array().cloned().unwrap_or_default();
        let descs = recent["primaryDocDescription"].as_array().cloned().unwrap_or_default();

        let mut stored = 0i64;
        let cik_trimmed = cik.trim_start_matches('0');
        for i in 0..forms.len().min(100) {
            let form = forms[i].as_str().unwrap_or_default();
            if !TARGET_FORMS.contains(&form) {
                continue;
            }
            let acc = accessions.get(i).and_then(|v| v.as_str()).unwrap_or_default();
            if acc.is_empty() {
                continue;
            }
            let filing_date = dates.get(i).and_then(|v| v.as_str()).unwrap_or_default();
            let Ok(filing_date) = filing_date.parse() else { continue };
            let doc = docs.get(i).and_then(|v| v.as_str()).unwrap_or_default();
            let desc = descs.get(i).and_then(|v| v.as_str()).unwrap_or(form);
            let acc_clean = acc.replace('-', "");
            let filing_url = if doc.is_empty() {
                String::new()
            } else {
                format!("https://www.sec.gov/Archives/edgar/data/{cik_trimmed}/{acc_clean}/{doc}")
            };

            let filing = intel_core::EntityFiling {
                ticker: entity.ticker.clone(),
                cik: Some(cik.to_string()),
                accession_number: acc.to_string(),
                filing_type: form.to_string(),
                filing_date,
                filing_url,
                description: Some(desc.to_string()),
            };
            if repo.upsert_filing(&filing).await.is_ok() {
                stored += 1;
            }
        }
        stored
    }

}

#[async_trait]
impl Provider for SecEdgarProvider {
    fn name(&self) -> &str {
        "sec_edgar"
    }

    fn is_configured(&self) -> bool {
        !self.user_agent.is_empty()
    }

    fn rate_limit_ok(&self) -> bool {
        true
    }

    async fn fetch_company_data(&self, entity: &Entity) -> Vec<ProviderResult> {
        let mut results = Vec::new();
        if entity.ticker.is_empty() {
            return vec![err_result("sec_edgar", "all", "no ticker")];
        }

        let cik = match &entity.cik {
            Some(c) if !c.is_empty() => Some(c.clone()),
            _ => self.resolve_cik(&entity.ticker).await,
        };
        let Some(cik) = cik else {
            return vec![err_result("sec_edgar", "all", format!("could not resolve CIK for {}", entity.ticker))];
        };

        match self.fetch_company_facts(&cik).await {
            Some(facts) => {
                let stored = self.store_financials(self.repo.as_ref(), entity, &facts).await;
                if stored > 0 {
                    results.push(ok_result("sec_edgar", "financials", stored));
                } else {
                    results.push(err_result("sec_edgar", "financials", "no XBRL data parsed"));
                }
            }
            None => results.push(err_result("sec_edgar", "financials", "companyfacts returned empty")),
        }

        let filings = self.fetch_filings(self.repo.as_ref(), &cik, entity).await;
        results.push(ok_result("sec_edgar", "filings", filings));
        results
    }
}
