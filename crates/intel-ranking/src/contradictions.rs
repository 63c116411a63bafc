use chrono::Utc;
use intel_core::{Contradiction, RankedEvidenceItem, ThreatLevel};

const ACTION_WORDS: &[&str] = &["act", "immediate", "respond", "accelerate", "launch"];
const WAIT_WORDS: &[&str] = &["monitor", "continue", "observe", "hold", "wait"];
const TOP_N: usize = 8;
const MIN_EVIDENCE: usize = 3;
const STALE_AFTER_HOURS: i64 = 18;

/// Flags conflicting threat levels or conflicting action/wait language
/// among the top evidence items, per `ranking.py::_detect_contradictions`.
pub fn detect_contradictions(items: &[RankedEvidenceItem]) -> Vec<Contradiction> {
    let top = &items[..items.len().min(TOP_N)];
    let mut contradictions = Vec::new();

    let has_high = top.iter().any(|i| i.threat_level == ThreatLevel::High);
    let has_low = top.iter().any(|i| i.threat_level == ThreatLevel::Low);
    if has_high && has_low {
        contradictions.push(Contradiction {
            kind: "threat_level_conflict".to_string(),
            detail: "Evidence contains both high-risk and low-risk interpretations.".to_string(),
        });
    }

    let mut action_found = false;
    let mut wait_found = false;
    for item in top {
        let recommendation = item.recommendation.to_lowercase();
        if ACTION_WORDS.iter().any(|w| recommendation.contains(w)) {
            action_found = true;
        }
        if WAIT_WORDS.iter().any(|w| recommendation.contains(w)) {
            wait_found = true;
        }
    }
    if action_found && wait_found {
        contradictions.push(Contradiction {
            kind: "recommendation_conflict".to_string(),
            detail: "Evidence recommends both immediate action and monitor-only posture.".to_string(),
        });
    }

    contradictions
}

/// Formats the top-3 ranked items into human-readable shift strings, per
/// `ranking.py::_build_signal_shifts`.
pub fn build_signal_shifts(items: &[RankedEvidenceItem]) -> Vec<String> {
    let mut shifts: Vec<String> = Vec::new();
    for item in items.iter().take(3) {
        let line = format!(
            "{}: {} risk signal at confidence {:.2}.",
            item.source_name,
            item.threat_level.as_str(),
            item.confidence
        );
        if !shifts.contains(&line) {
            shifts.push(line);
        }
    }
    if shifts.is_empty() {
        shifts.push("No strong market shift detected in the available evidence.".to_string());
    }
    shifts
}

/// True when there's too little evidence or the freshest item is stale,
/// per `ranking.py::_needs_refresh`.
pub fn needs_refresh(items: &[RankedEvidenceItem]) -> bool {
    if items.len() < MIN_EVIDENCE {
        return true;
    }
    let freshest = items.iter().map(|i| i.created_at).max();
    match freshest {
        None => true,
        Some(freshest) => {
            let age_hours = (Utc::now() - freshest).num_seconds().max(0) as f64 / 3600.0;
            age_hours > STALE_AFTER_HOURS as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intel_core::CriticStatus;

    fn item(threat_level: ThreatLevel, recommendation: &str) -> RankedEvidenceItem {
        RankedEvidenceItem {
            source_name: "Source".to_string(),
            source_url: String::new(),
            text: String::new(),
            recommendation: recommendation.to_string(),
            threat_level,
            confidence: 0.6,
            evidence_ref: String::new(),
            critic_status: CriticStatus::Approved,
            created_at: Utc::now(),
            text_rank: 0.0,
            semantic_score: None,
            entity_relevance: 0.5,
            rank_score: 0.5,
        }
    }

    #[test]
    fn detects_threat_level_conflict() {
        let items = vec![item(ThreatLevel::High, ""), item(ThreatLevel::Low, "")];
        let contradictions = detect_contradictions(&items);
        assert!(contradictions.iter().any(|c| c.kind == "threat_level_conflict"));
    }

    #[test]
    fn detects_recommendation_conflict() {
        let items = vec![
            item(ThreatLevel::Medium, "act immediately"),
            item(ThreatLevel::Medium, "continue to monitor"),
        ];
        let contradictions = detect_contradictions(&items);
        assert!(contradictions.iter().any(|c| c.kind == "recommendation_conflict"));
    }

    #[test]
    fn needs_refresh_when_below_minimum_evidence() {
        let items = vec![item(ThreatLevel::Low, "")];
        assert!(needs_refresh(&items));
    }

    #[test]
    fn signal_shifts_fallback_when_empty() {
        let shifts = build_signal_shifts(&[]);
        assert_eq!(shifts, vec!["No strong market shift detected in the available evidence.".to_string()]);
    }
}
