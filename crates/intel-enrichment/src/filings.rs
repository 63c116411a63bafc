use intel_core::IntelResult;
use intel_repository::Repository;
use serde_json::json;

const FILINGS_LIMIT: i64 = 10;

/// Builds the filings summary section, per
/// `core/pipeline/enrichment.py::_build_filings_summary`.
pub async fn build_filings_summary(repo: &dyn Repository, ticker: Option<&str>) -> IntelResult<serde_json::Value> {
    let Some(ticker) = ticker else {
        return Ok(json!({ "available": false, "count": 0, "filings": [] }));
    };

    let filings = repo.get_filings(ticker, None, FILINGS_LIMIT).await?;
    let available = !filings.is_empty();

    Ok(json!({
        "available": available,
        "count": filings.len(),
        "filings": filings.iter().map(|f| json!({
            "type": f.filing_type,
            "date": f.filing_date,
            "description": f.description,
            "url": f.filing_url,
        })).collect::<Vec<_>>(),
    }))
}

