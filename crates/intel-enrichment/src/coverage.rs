use intel_core::{IntelResult, SocialSentimentView};
use intel_providers::FinancialSnapshot;
use intel_repository::Repository;
use serde_json::json;

/// Weight given to each signal in the coverage score. Financials and filings
/// weights are additionally scaled by how much data backs them (quarters on
/// hand / filing count) before being applied, a redesign beyond the flat
/// boolean weighting in `core/pipeline/enrichment.py::_build_coverage_assessment`.
const WEIGHT_FINANCIALS: f64 = 0.25;
const WEIGHT_FILINGS: f64 = 0.15;
const WEIGHT_MACRO: f64 = 0.10;
const WEIGHT_SOCIAL: f64 = 0.10;
const WEIGHT_NEWS: f64 = 0.20;
const WEIGHT_PRICE: f64 = 0.20;

const FINANCIALS_FULL_QUARTERS: f64 = 8.0;
const FILINGS_FULL_COUNT: f64 = 5.0;

fn recompute_score(
    has_financials: bool,
    financials_quarters: i32,
    has_filings: bool,
    filings_count: i32,
    has_macro: bool,
    has_social: bool,
    has_news: bool,
    has_price: bool,
) -> f64 {
    let financials_scale = (financials_quarters as f64 / FINANCIALS_FULL_QUARTERS).min(1.0);
    let filings_scale = (filings_count as f64 / FILINGS_FULL_COUNT).min(1.0);

    let mut score = 0.0;
    if has_financials {
        score += WEIGHT_FINANCIALS * financials_scale;
    }
    if has_filings {
        score += WEIGHT_FILINGS * filings_scale;
    }
    if has_macro {
        score += WEIGHT_MACRO;
    }
    if has_social {
        score += WEIGHT_SOCIAL;
    }
    if has_news {
        score += WEIGHT_NEWS;
    }
    if has_price {
        score += WEIGHT_PRICE;
    }
    score
}

/// Builds the coverage-assessment section, overlaying real-time snapshot and
/// sentiment signals on top of the stored coverage row and recomputing the
/// score with the scaled weighting. Grounded on
/// `core/pipeline/enrichment.py::_build_coverage_assessment`, reading the
/// stored row via the read-only `get_coverage` lookup (matching the
/// original's `db.get_entity_coverage` call, not the write-path `update_coverage`).
pub async fn build_coverage_assessment(
    repo: &dyn Repository,
    ticker: &str,
    financials: &FinancialSnapshot,
    sentiment: &SocialSentimentView,
) -> IntelResult<serde_json::Value> {
    let stored = repo.get_coverage(ticker).await?;

    let has_price = financials.fifty_two_week_range.is_some();
    let has_financials_live = financials.price.is_some() && financials.trailing_pe.is_some();
    let has_social = sentiment.available;

    let (has_financials, financials_quarters, has_filings, filings_count, has_macro, has_news, stored_score) = match &stored {
        Some(row) => (
            row.has_financials || has_financials_live,
            row.financials_quarters,
            row.has_filings,
            row.filings_count,
            row.has_macro,
            row.has_news,
            row.coverage_score,
        ),
        None => (has_financials_live, 0, false, 0, false, false, 0.0),
    };

    let recomputed = recompute_score(has_financials, financials_quarters, has_filings, filings_count, has_macro, has_social, has_news, has_price);
    let score = stored_score.max(recomputed);

    Ok(json!({
        "ticker": ticker,
        "coverage_score": score,
        "breakdown": {
            "has_financials": has_financials,
            "financials_quarters": financials_quarters,
            "has_filings": has_filings,
            "filings_count": filings_count,
            "has_macro": has_macro,
            "has_social": has_social,
            "has_news": has_news,
            "has_price": has_price,
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_coverage_scores_one() {
        let score = recompute_score(true, 8, true, 5, true, true, true, true);
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn partial_financials_history_scales_down_its_weight() {
        let full = recompute_score(true, 8, false, 0, false, false, false, false);
        let half = recompute_score(true, 4, false, 0, false, false, false, false);
        assert!((half - full / 2.0).abs() < 1e-9);
    }

    #[test]
    fn no_signals_scores_zero() {
        assert_eq!(recompute_score(false, 0, false, 0, false, false, false, false), 0.0);
    }
}
