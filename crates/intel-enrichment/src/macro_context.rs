use intel_core::{IntelResult, MacroContextView, MacroIndicator};
use intel_providers::CORE_SERIES;
use intel_repository::Repository;
use serde_json::json;

/// The subset of `CORE_SERIES` the headline summary line highlights, mirroring
/// the handful of indicators `core/pipeline/enrichment.py::_build_macro_context`
/// calls out by name (GDP, inflation, unemployment, the policy rate, and
/// volatility) translated onto our own authoritative series list.
const HEADLINE_SERIES: &[&str] = &["GDP", "CPIAUCSL", "UNRATE", "FEDFUNDS", "VIXCLS"];

fn series_label(id: &str) -> &'static str {
    match id {
        "GDP" => "GDP",
        "CPIAUCSL" => "CPI",
        "UNRATE" => "Unemployment",
        "FEDFUNDS" => "Fed Rate",
        "VIXCLS" => "VIX",
        _ => "Indicator",
    }
}

/// Builds the macro-economic context section from the latest stored FRED
/// observations, per `core/pipeline/enrichment.py::_build_macro_context`.
pub async fn build_macro_context(repo: &dyn Repository) -> IntelResult<(MacroContextView, serde_json::Value)> {
    let ids: Vec<String> = CORE_SERIES.iter().map(|(id, _)| id.to_string()).collect();
    let observations = repo.latest_macro_values(&ids).await?;

    let mut indicators = Vec::with_capacity(observations.len());
    let mut summary_parts = Vec::new();
    for obs in &observations {
        indicators.push(MacroIndicator {
            series_id: obs.series_id.clone(),
            name: obs.series_name.clone(),
            value: Some(obs.value),
            date: Some(obs.date),
        });
        if HEADLINE_SERIES.contains(&obs.series_id.as_str()) {
            summary_parts.push(format!("{}: {:.2}", series_label(&obs.series_id), obs.value));
        }
    }

    let available = !indicators.is_empty();
    let view = MacroContextView { available, indicators: indicators.clone() };

    let payload = json!({
        "available": available,
        "summary": summary_parts.join(", "),
        "indicators": indicators.iter().map(|i| json!({
            "series_id": i.series_id,
            "name": i.name,
            "value": i.value,
            "date": i.date,
        })).collect::<Vec<_>>(),
    });

    Ok((view, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headline_series_covers_the_five_named_indicators() {
        for id in HEADLINE_SERIES {
            assert!(CORE_SERIES.iter().any(|(series_id, _)| series_id == id), "{id} missing from CORE_SERIES");
        }
    }

    #[test]
    fn series_label_falls_back_for_unknown_ids() {
        assert_eq!(series_label("DTWEXBGS"), "Indicator");
    }
}
