use intel_core::{FinancialPeriod, HistoricalTrendsView, IntelResult, PeriodSummary, PeriodType};
use intel_repository::Repository;
use serde_json::json;

use crate::backfill::QuarterlyBackfillProvider;

const QUARTERLY_LIMIT: i64 = 12;
const ANNUAL_LIMIT: i64 = 5;
const MAX_QUARTERS_RETURNED: usize = 8;
const MAX_ANNUAL_RETURNED: usize = 5;
const TREND_THRESHOLD: f64 = 0.05;

fn to_summary(period: &FinancialPeriod) -> PeriodSummary {
    PeriodSummary {
        period_end: period.period_end,
        revenue: period.income.revenue,
        net_income: period.income.net_income,
        gross_profit: period.income.gross_profit,
        eps: period.income.eps,
    }
}

fn trend_direction(quarters: &[PeriodSummary]) -> String {
    if quarters.len() < 2 {
        return "stable".to_string();
    }
    match (quarters[0].revenue, quarters[1].revenue) {
        (Some(recent), Some(prev)) if prev != 0.0 => {
            let change = (recent - prev) / prev.abs();
            if change > TREND_THRESHOLD {
                "growing".to_string()
            } else if change < -TREND_THRESHOLD {
                "declining".to_string()
            } else {
                "stable".to_string()
            }
        }
        _ => "stable".to_string(),
    }
}

/// Builds quarterly/annual revenue trends from stored `FinancialPeriod`
/// rows, triggering the inline backfill when no quarter has a revenue
/// figure, per `core/pipeline/enrichment.py::_build_historical_trends`.
pub async fn build_historical_trends(
    repo: &dyn Repository,
    backfill: &dyn QuarterlyBackfillProvider,
    ticker: Option<&str>,
) -> IntelResult<(HistoricalTrendsView, serde_json::Value)> {
    let Some(ticker) = ticker else {
        return Ok((HistoricalTrendsView::default(), json!({ "available": false, "quarters": [], "annual": [] })));
    };

    let mut quarterly = repo.get_financial_history(ticker, PeriodType::Quarterly, QUARTERLY_LIMIT).await?;
    let annual = repo.get_financial_history(ticker, PeriodType::Annual, ANNUAL_LIMIT).await?;

    let has_revenue = quarterly.iter().any(|p| p.income.revenue.is_some());
    if !has_revenue {
        match backfill.backfill_quarters(ticker).await {
            Ok(fetched) if !fetched.is_empty() => {
                quarterly = repo.get_financial_history(ticker, PeriodType::Quarterly, QUARTERLY_LIMIT).await?;
            }
            Ok(_) => {}
            Err(err) => tracing::warn!(ticker, error = %err, "quarterly backfill failed"),
        }
    }

    let q_summaries: Vec<PeriodSummary> = quarterly.iter().take(MAX_QUARTERS_RETURNED).map(to_summary).collect();
    let a_summaries: Vec<PeriodSummary> = annual.iter().take(MAX_ANNUAL_RETURNED).map(to_summary).collect();
    let direction = trend_direction(&q_summaries);
    let available = !q_summaries.is_empty() || !a_summaries.is_empty();

    let view = HistoricalTrendsView {
        available,
        trend_direction: direction.clone(),
        quarters: q_summaries.clone(),
        annual: a_summaries.clone(),
    };

    let payload = json!({
        "available": available,
        "trend_direction": direction,
        "quarters_available": q_summaries.len(),
        "quarters": q_summaries.iter().map(period_summary_json).collect::<Vec<_>>(),
        "annual": a_summaries.iter().map(period_summary_json).collect::<Vec<_>>(),
    });

    Ok((view, payload))
}

fn period_summary_json(s: &PeriodSummary) -> serde_json::Value {
    json!({
        "period_end": s.period_end,
        "revenue": s.revenue,
        "net_income": s.net_income,
        "gross_profit": s.gross_profit,
        "eps": s.eps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use intel_core::{BalanceSheet, CashFlowStatement, IncomeStatement, KeyMetrics};

    fn period(revenue: Option<f64>) -> FinancialPeriod {
        FinancialPeriod {
            id: None,
            entity_id: None,
            ticker: "TSLA".to_string(),
            period_type: PeriodType::Quarterly,
            period_end: chrono::NaiveDate::from_ymd_opt(2026, 3, 31).unwrap(),
            fiscal_year: 2026,
            fiscal_quarter: Some(1),
            source_provider: "fmp".to_string(),
            income: IncomeStatement { revenue, ..Default::default() },
            balance: BalanceSheet::default(),
            cash_flow: CashFlowStatement::default(),
            key_metrics: KeyMetrics::default(),
        }
    }

    #[test]
    fn trend_direction_flags_growth_above_threshold() {
        let quarters = vec![
            PeriodSummary { period_end: chrono::Utc::now().date_naive(), revenue: Some(110.0), net_income: None, gross_profit: None, eps: None },
            PeriodSummary { period_end: chrono::Utc::now().date_naive(), revenue: Some(100.0), net_income: None, gross_profit: None, eps: None },
        ];
        assert_eq!(trend_direction(&quarters), "growing");
    }

    #[test]
    fn trend_direction_is_stable_with_one_quarter() {
        let quarters = vec![PeriodSummary { period_end: chrono::Utc::now().date_naive(), revenue: Some(100.0), net_income: None, gross_profit: None, eps: None }];
        assert_eq!(trend_direction(&quarters), "stable");
    }

    #[test]
    fn to_summary_carries_income_fields() {
        let p = period(Some(42.0));
        let summary = to_summary(&p);
        assert_eq!(summary.revenue, Some(42.0));
    }
}
