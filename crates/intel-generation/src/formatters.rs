use intel_core::{HistoricalTrendsView, MacroContextView, RankedEvidenceItem, SocialSentimentView};
use intel_providers::FinancialSnapshot;

/// Compact `$1.2B`-style formatting for large numbers, per
/// `core/llm/formatters.py::_fmt`.
pub fn fmt_compact(value: Option<f64>) -> String {
    let Some(n) = value else { return "n/a".to_string() };
    let a = n.abs();
    if a >= 1e12 {
        format!("${:.1}T", n / 1e12)
    } else if a >= 1e9 {
        format!("${:.1}B", n / 1e9)
    } else if a >= 1e6 {
        format!("${:.1}M", n / 1e6)
    } else {
        format!("${}", group_thousands(n.round() as i64))
    }
}

/// Inserts thousands separators into an integer, e.g. `1234567` -> `1,234,567`.
fn group_thousands(n: i64) -> String {
    let sign = if n < 0 { "-" } else { "" };
    let digits = n.unsigned_abs().to_string();
    let grouped: Vec<String> = digits
        .as_bytes()
        .rchunks(3)
        .rev()
        .map(|chunk| String::from_utf8_lossy(chunk).to_string())
        .collect();
    format!("{sign}{}", grouped.join(","))
}

/// Percentage formatting, per `core/llm/formatters.py::_pct`.
pub fn fmt_pct(value: Option<f64>) -> String {
    match value {
        Some(n) => format!("{:.1}%", n * 100.0),
        None => "n/a".to_string(),
    }
}

pub fn format_evidence_block(items: &[RankedEvidenceItem], limit: usize) -> String {
    if items.is_empty() {
        return "No evidence available.".to_string();
    }
    items
        .iter()
        .take(limit)
        .enumerate()
        .map(|(i, item)| {
            let excerpt: String = item.text.chars().take(200).collect();
            format!(
                "{}. [{}] (confidence={}, threat={}) {}",
                i + 1,
                item.source_name,
                item.confidence,
                item.threat_level.as_str(),
                excerpt
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_financials_block(snapshot: &FinancialSnapshot) -> String {
    let Some(symbol) = snapshot.symbol.as_deref() else {
        return "No financial snapshot available.".to_string();
    };
    let src = &snapshot.source;
    let price = snapshot.price.map(|p| p.to_string()).unwrap_or_else(|| "n/a".to_string());
    let currency = snapshot.currency.clone().unwrap_or_default();
    let pe_trailing = snapshot.trailing_pe.map(|p| p.to_string()).unwrap_or_else(|| "n/a".to_string());
    let pe_forward = snapshot.forward_pe.map(|p| p.to_string()).unwrap_or_else(|| "n/a".to_string());
    let debt_to_equity = snapshot.debt_to_equity.map(|p| p.to_string()).unwrap_or_else(|| "n/a".to_string());
    let range_52w = snapshot.fifty_two_week_range.clone().unwrap_or_else(|| "n/a".to_string());

    [
        format!("Symbol: {symbol}"),
        format!("Price: {price} {currency} (Source: {src})").trim().to_string(),
        format!("Market Cap: {} (Source: {src})", fmt_compact(snapshot.market_cap)),
        format!("P/E (trailing): {pe_trailing} (Source: {src})"),
        format!("P/E (forward): {pe_forward} (Source: {src})"),
        format!("Revenue Growth YoY: {} (Source: {src})", fmt_pct(snapshot.revenue_growth)),
        format!("Earnings Growth YoY: {} (Source: {src})", fmt_pct(snapshot.earnings_growth)),
        format!("Gross Margin: {} (Source: {src})", fmt_pct(snapshot.gross_margin)),
        format!("Operating Margin: {} (Source: {src})", fmt_pct(snapshot.operating_margin)),
        format!("Net Margin: {} (Source: {src})", fmt_pct(snapshot.profit_margin)),
        format!("Debt/Equity: {debt_to_equity} (Source: {src})"),
        format!("52W Range: {range_52w} (Source: {src})"),
    ]
    .join("\n")
}

pub fn format_macro_block(macro_context: &MacroContextView) -> String {
    if !macro_context.available {
        return "No macro data available.".to_string();
    }
    if macro_context.indicators.is_empty() {
        return "Macro data flag set but no indicators populated.".to_string();
    }
    macro_context
        .indicators
        .iter()
        .map(|indicator| {
            let value = indicator.value.map(|v| v.to_string()).unwrap_or_else(|| "n/a".to_string());
            let date = indicator.date.map(|d| d.to_string()).unwrap_or_default();
            format!("{}: {} (as of {})", indicator.name, value, date)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_sentiment_block(sentiment: &SocialSentimentView) -> String {
    if !sentiment.available {
        return "No social sentiment data available.".to_string();
    }
    format!(
        "Mentions (7d): {}\nAvg Sentiment: {:.2} ({})\nDays of data: {}",
        sentiment.total_mentions_7d, sentiment.avg_sentiment, sentiment.sentiment_label, sentiment.days_data
    )
}

pub fn format_trend_block(historical: &HistoricalTrendsView) -> String {
    if !historical.available {
        return "No historical financial data available.".to_string();
    }
    let quarters: Vec<_> = historical.quarters.iter().take(4).collect();
    if quarters.is_empty() {
        return "Historical flag set but no periods available.".to_string();
    }
    let mut lines = vec![format!("Trend direction: {}", historical.trend_direction)];
    for q in quarters {
        lines.push(format!(
            "  {}: Rev={} NI={}",
            q.period_end,
            fmt_compact(q.revenue),
            fmt_compact(q.net_income)
        ));
    }
    lines.join("\n")
}

/// Extracts a JSON array from LLM output, tolerating markdown code fences
/// around it, per `core/llm/formatters.py::_parse_json_array`.
pub fn parse_json_array(text: &str) -> Option<serde_json::Value> {
    let cleaned = text.trim();
    let cleaned = if cleaned.starts_with("```") {
        cleaned
            .lines()
            .filter(|line| !line.trim_start().starts_with("```"))
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        cleaned.to_string()
    };
    let cleaned = cleaned.trim();
    let start = cleaned.find('[')?;
    let end = cleaned.rfind(']')?;
    if end < start {
        return None;
    }
    let slice = &cleaned[start..=end];
    match serde_json::from_str(slice) {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("failed to parse LLM JSON output");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fmt_compact_scales_by_magnitude() {
        assert_eq!(fmt_compact(Some(1.2e9)), "$1.2B");
        assert_eq!(fmt_compact(Some(53.8e6)), "$53.8M");
        assert_eq!(fmt_compact(None), "n/a");
    }

    #[test]
    fn fmt_compact_groups_small_values() {
        assert_eq!(fmt_compact(Some(123456.0)), "$123,456");
    }

    #[test]
    fn parse_json_array_strips_markdown_fences() {
        let text = "```json\n[{\"name\": \"bull\"}]\n```";
        let parsed = parse_json_array(text).expect("should parse");
        assert!(parsed.is_array());
    }

    #[test]
    fn parse_json_array_returns_none_without_brackets() {
        assert_eq!(parse_json_array("no json here"), None);
    }
}
