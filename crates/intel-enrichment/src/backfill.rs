use std::sync::Arc;

use async_trait::async_trait;
use intel_core::{FinancialPeriod, IntelResult, PeriodType};
use intel_providers::{FmpProvider, Provider};
use intel_repository::{LookupKey, Repository};

/// Models the original's inline yfinance quarterly backfill as a swappable
/// provider so tests can substitute a deterministic stub, per SPEC_FULL.md's
/// "Added — quarterly backfill provider" note.
#[async_trait]
pub trait QuarterlyBackfillProvider: Send + Sync {
    async fn backfill_quarters(&self, ticker: &str) -> IntelResult<Vec<FinancialPeriod>>;
}

/// Concrete backfill: reuses the FMP quarterly-statement fetch-and-store
/// chain already built for real-time snapshot gap-filling, then re-reads
/// what landed in the repository — the same "fetch then re-query" shape as
/// `core/pipeline/enrichment.py::_build_historical_trends`'s inline fallback.
pub struct FmpBackfillProvider {
    repo: Arc<dyn Repository>,
    fmp: Arc<FmpProvider>,
}

impl FmpBackfillProvider {
    pub fn new(repo: Arc<dyn Repository>, fmp: Arc<FmpProvider>) -> Self {
        Self { repo, fmp }
    }
}

#[async_trait]
impl QuarterlyBackfillProvider for FmpBackfillProvider {
    async fn backfill_quarters(&self, ticker: &str) -> IntelResult<Vec<FinancialPeriod>> {
        let Some(entity) = self.repo.lookup_entity(LookupKey::Ticker(ticker)).await? else {
            return Ok(Vec::new());
        };
        let results = self.fmp.fetch_company_data(&entity).await;
        if results.iter().all(|r| !r.success) {
            tracing::warn!(ticker, "quarterly backfill fetched no statement rows");
        }
        self.repo.get_financial_history(ticker, PeriodType::Quarterly, 12).await
    }
}

/// Deterministic stub used in tests: returns a fixed set of periods with no
/// network or repository access.
pub struct StubBackfillProvider {
    pub periods: Vec<FinancialPeriod>,
}

#[async_trait]
impl QuarterlyBackfillProvider for StubBackfillProvider {
    async fn backfill_quarters(&self, _ticker: &str) -> IntelResult<Vec<FinancialPeriod>> {
        Ok(self.periods.clone())
    }
}
