use intel_providers::FinancialSnapshot;
use serde_json::json;

/// Builds the report's `financial_performance` section, grounded on
/// `core/pipeline/enrichment.py::_build_financial_performance`. Field names
/// carry the original's dashboard-compatibility aliases (`revenue_growth_yoy`
/// and `revenue_growth` both present, etc.) since downstream consumers of
/// this JSON are out of scope to change.
pub fn build_financial_performance(snapshot: &FinancialSnapshot) -> serde_json::Value {
    let mut summary_lines = Vec::new();
    if let Some(symbol) = &snapshot.symbol {
        summary_lines.push(format!("Symbol: {symbol}"));
    }
    if let Some(price) = snapshot.price {
        let currency = snapshot.currency.clone().unwrap_or_default();
        summary_lines.push(format!("Market Price: {price} {currency}").trim().to_string());
    }
    if let Some(market_cap) = snapshot.market_cap {
        summary_lines.push(format!("Market Cap: {}", format_compact_number(Some(market_cap))));
    }
    if let Some(range) = &snapshot.fifty_two_week_range {
        summary_lines.push(format!("52W Range: {range}"));
    }

    let summary = if summary_lines.is_empty() {
        "No reliable financial snapshot was available from free public finance data at query time.".to_string()
    } else {
        summary_lines.join("; ")
    };

    let revenue_growth = format_ratio_percent(snapshot.revenue_growth);
    let earnings_growth = format_ratio_percent(snapshot.earnings_growth);
    let gross_margin = format_ratio_percent(snapshot.gross_margin);
    let operating_margin = format_ratio_percent(snapshot.operating_margin);
    let net_margin = format_ratio_percent(snapshot.profit_margin);

    json!({
        "summary": summary,
        "market_cap": snapshot.market_cap,
        "beta": snapshot.beta,
        "sector": snapshot.sector,
        "industry": snapshot.industry,
        "valuation": {
            "trailing_pe": snapshot.trailing_pe,
            "forward_pe": snapshot.forward_pe,
            "peg_ratio": snapshot.peg_ratio,
        },
        "growth": {
            "revenue_growth_yoy": revenue_growth,
            "revenue_growth": revenue_growth,
            "earnings_growth_yoy": earnings_growth,
            "earnings_growth": earnings_growth,
        },
        "profitability": {
            "gross_margin": gross_margin,
            "gross_margins": gross_margin,
            "operating_margin": operating_margin,
            "operating_margins": operating_margin,
            "net_margin": net_margin,
            "profit_margins": net_margin,
        },
        "liquidity": {
            "debt_to_equity": snapshot.debt_to_equity,
            "current_ratio": snapshot.current_ratio,
            "next_earnings_date": snapshot.next_earnings_date,
        },
    })
}

fn format_compact_number(value: Option<f64>) -> String {
    let Some(n) = value else { return "n/a".to_string() };
    let a = n.abs();
    if a >= 1e12 {
        format!("{:.2}T", n / 1e12)
    } else if a >= 1e9 {
        format!("{:.2}B", n / 1e9)
    } else if a >= 1e6 {
        format!("{:.2}M", n / 1e6)
    } else {
        format!("{n:.2}")
    }
}

fn format_ratio_percent(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.1}%", v * 100.0),
        None => "n/a".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot_gets_fallback_summary() {
        let snapshot = FinancialSnapshot { source: "test".to_string(), ..Default::default() };
        let value = build_financial_performance(&snapshot);
        assert!(value["summary"].as_str().unwrap().contains("No reliable financial snapshot"));
    }

    #[test]
    fn populated_snapshot_includes_symbol_in_summary() {
        let snapshot = FinancialSnapshot {
            symbol: Some("TSLA".to_string()),
            price: Some(250.0),
            market_cap: Some(800_000_000_000.0),
            source: "test".to_string(),
            ..Default::default()
        };
        let value = build_financial_performance(&snapshot);
        assert!(value["summary"].as_str().unwrap().contains("TSLA"));
        assert_eq!(value["growth"]["revenue_growth_yoy"], "n/a");
    }
}
