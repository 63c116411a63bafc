use intel_core::{DecisionCard, HistoricalTrendsView, MacroContextView, RankedEvidenceItem, Scenario};
use intel_generation::GenerationClient;
use intel_providers::FinancialSnapshot;

const LLM_EVIDENCE_SAMPLE: usize = 5;

fn arithmetic_fallback(decision: &DecisionCard, evidence: &[RankedEvidenceItem]) -> Vec<Scenario> {
    let base_confidence = decision.confidence;
    let top_source = evidence.first().map(|e| e.source_name.as_str()).unwrap_or("current evidence");

    let bull_raw = (base_confidence + 0.12).min(0.92);
    let base_raw = base_confidence.min(0.8).max(0.1);
    let bear_raw = (1.0 - base_confidence + 0.05).max(0.1);
    let total = bull_raw + base_raw + bear_raw;

    let bull_prob = (bull_raw / total * 1000.0).round() / 1000.0;
    let base_prob = (base_raw / total * 1000.0).round() / 1000.0;
    let bear_prob = ((1.0 - bull_prob - base_prob).max(0.0) * 1000.0).round() / 1000.0;

    vec![
        Scenario {
            name: "bull".to_string(),
            probability: bull_prob,
            assumption: "Positive execution and demand signals hold across latest sources.".to_string(),
            impact: format!("Upside scenario if momentum from {top_source} continues."),
            trigger_signals: vec![
                "accelerating revenue growth".to_string(),
                "margin expansion".to_string(),
                "positive narrative shift".to_string(),
            ],
        },
        Scenario {
            name: "base".to_string(),
            probability: base_prob,
            assumption: "Current trajectory persists without major external shocks.".to_string(),
            impact: "Moderate performance with manageable risk and incremental changes.".to_string(),
            trigger_signals: vec![
                "stable guidance".to_string(),
                "mixed but non-deteriorating sentiment".to_string(),
                "controlled risk levels".to_string(),
            ],
        },
        Scenario {
            name: "bear".to_string(),
            probability: bear_prob,
            assumption: "Competitive pressure or macro events weaken current momentum.".to_string(),
            impact: "Downside risk rises; defensive posture and tighter monitoring required.".to_string(),
            trigger_signals: vec![
                "negative earnings revisions".to_string(),
                "rising risk indicators".to_string(),
                "narrative deterioration".to_string(),
            ],
        },
    ]
}

fn parse_llm_scenarios(value: serde_json::Value) -> Option<Vec<Scenario>> {
    let array = value.as_array()?;
    if array.len() != 3 {
        return None;
    }
    let mut scenarios = Vec::with_capacity(3);
    let mut total_prob = 0.0;
    for item in array {
        total_prob += item.get("probability").and_then(|v| v.as_f64()).unwrap_or(0.33);
    }
    if total_prob <= 0.0 {
        return None;
    }
    for item in array {
        let raw_prob = item.get("probability").and_then(|v| v.as_f64()).unwrap_or(0.33);
        let probability = (raw_prob / total_prob * 1000.0).round() / 1000.0;
        scenarios.push(Scenario {
            name: item.get("name").and_then(|v| v.as_str()).unwrap_or("scenario").to_string(),
            probability,
            assumption: item.get("assumption").and_then(|v| v.as_str()).unwrap_or("").to_string(),
            impact: item.get("impact").and_then(|v| v.as_str()).unwrap_or("").to_string(),
            trigger_signals: item
                .get("trigger_signals")
                .and_then(|v| v.as_array())
                .map(|arr| arr.iter().filter_map(|s| s.as_str().map(String::from)).collect())
                .unwrap_or_default(),
        });
    }
    Some(scenarios)
}

/// Resolves a scenario set from an already-generated LLM payload (e.g. from
/// the combined intelligence fan-out), falling back to the arithmetic
/// baseline if the payload is absent or malformed. Lets callers reuse one
/// LLM call across both the narrative and scenario sections instead of
/// requesting scenarios twice.
pub fn resolve_scenarios(
    raw: Option<serde_json::Value>,
    decision: &DecisionCard,
    evidence: &[RankedEvidenceItem],
) -> Vec<Scenario> {
    raw.and_then(parse_llm_scenarios).unwrap_or_else(|| arithmetic_fallback(decision, evidence))
}

/// Builds bull/base/bear scenarios, preferring an LLM-generated set when a
/// generation client is configured and falls back to the arithmetic baseline
/// otherwise, per `core/pipeline/enrichment.py::_build_scenarios`.
pub async fn build_scenarios(
    client: Option<&GenerationClient>,
    decision: &DecisionCard,
    evidence: &[RankedEvidenceItem],
    financials: &FinancialSnapshot,
    historical: &HistoricalTrendsView,
    macro_context: &MacroContextView,
    query_text: &str,
) -> Vec<Scenario> {
    if let Some(client) = client {
        let sample: Vec<_> = evidence.iter().take(LLM_EVIDENCE_SAMPLE).cloned().collect();
        let query = if query_text.is_empty() { "market analysis" } else { query_text };
        if let Some(raw) = intel_generation::generate_scenarios(client, query, &sample, financials, historical, macro_context).await {
            if let Some(scenarios) = parse_llm_scenarios(raw) {
                return scenarios;
            }
        }
    }
    arithmetic_fallback(decision, evidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use intel_core::CriticStatus;
    use intel_core::ThreatLevel;

    fn decision(confidence: f64) -> DecisionCard {
        DecisionCard { recommendation: "hold".to_string(), confidence, risk_level: "moderate".to_string() }
    }

    fn evidence_item() -> RankedEvidenceItem {
        RankedEvidenceItem {
            source_name: "10-K".to_string(),
            source_url: "https://example.com".to_string(),
            text: "text".to_string(),
            recommendation: "hold".to_string(),
            threat_level: ThreatLevel::Low,
            confidence: 0.6,
            evidence_ref: "e1".to_string(),
            critic_status: CriticStatus::Approved,
            created_at: chrono::Utc::now(),
            text_rank: 0.5,
            semantic_score: None,
            entity_relevance: 0.5,
            rank_score: 0.5,
        }
    }

    #[test]
    fn arithmetic_fallback_probabilities_sum_to_one() {
        let scenarios = arithmetic_fallback(&decision(0.6), &[evidence_item()]);
        let total: f64 = scenarios.iter().map(|s| s.probability).sum();
        assert!((total - 1.0).abs() < 0.01);
    }

    #[test]
    fn arithmetic_fallback_names_bull_base_bear() {
        let scenarios = arithmetic_fallback(&decision(0.5), &[]);
        let names: Vec<_> = scenarios.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["bull", "base", "bear"]);
    }

    #[test]
    fn parse_llm_scenarios_rejects_wrong_count() {
        let value = serde_json::json!([{"name": "bull", "probability": 0.5}]);
        assert!(parse_llm_scenarios(value).is_none());
    }

    #[test]
    fn parse_llm_scenarios_renormalizes_probabilities() {
        let value = serde_json::json!([
            {"name": "bull", "probability": 1.0},
            {"name": "base", "probability": 1.0},
            {"name": "bear", "probability": 2.0},
        ]);
        let scenarios = parse_llm_scenarios(value).unwrap();
        let total: f64 = scenarios.iter().map(|s| s.probability).sum();
        assert!((total - 1.0).abs() < 0.01);
    }
}
