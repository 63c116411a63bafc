use intel_core::EvidenceCandidate;
use regex::Regex;

/// Corporate-suffix and generic legal-form tokens excluded when decomposing
/// a company name into meaningful parts. Never applied to the ticker match
/// path — see `entity_relevance` doc comment.
const STOP_WORDS: &[&str] = &[
    "limited", "inc", "corp", "company", "group", "holdings", "technologies", "international",
    "services", "the", "and", "new", "one", "first", "global", "systems", "solutions",
    "enterprises", "partners", "capital", "financial", "industries", "associates", "consulting",
    "management", "ltd", "plc", "llc", "co", "sa", "ag", "nv", "se", "gmbh",
];

fn name_parts(name_lower: &str) -> Vec<String> {
    name_lower
        .replace(',', "")
        .replace('.', "")
        .split_whitespace()
        .filter(|p| p.len() > 2 && !STOP_WORDS.contains(p))
        .map(|p| p.to_string())
        .collect()
}

fn ticker_pattern(ticker_lower: &str) -> Regex {
    Regex::new(&format!(r"\b{}\b", regex::escape(ticker_lower))).unwrap()
}

/// Scores how relevant a candidate is to the resolved entity, from 0.0 (no
/// match) to 1.0 (strong match). The stop-word set only filters the
/// **name** decomposition; a ticker like `SE` or `NV` always matches
/// verbatim via the ticker path regardless of how short or stop-word-like
/// it looks.
pub fn entity_relevance(ticker: Option<&str>, entity_name: Option<&str>, candidate: &EvidenceCandidate) -> f64 {
    if ticker.is_none() && entity_name.is_none() {
        return 0.5;
    }

    let title = candidate.source_name.to_lowercase();
    let insight = candidate.text.to_lowercase();
    let evidence_ref = candidate.evidence_ref.to_lowercase();
    let text = format!("{title} {insight} {evidence_ref}");

    let mut score = 0.0f64;

    let tick_lower = ticker.unwrap_or("").to_lowercase();
    if !tick_lower.is_empty() {
        let pattern = ticker_pattern(&tick_lower);
        if pattern.is_match(&title) {
            score = score.max(1.0);
        } else if pattern.is_match(&text) {
            score = score.max(0.8);
        }
    }

    let name_lower = entity_name.unwrap_or("").to_lowercase();
    let parts = name_parts(&name_lower);

    if !name_lower.is_empty() && title.contains(&name_lower) {
        score = score.max(0.95);
    } else if !parts.is_empty() {
        let name_hits = parts.iter().filter(|p| title.contains(p.as_str())).count();
        if name_hits > 0 {
            score = score.max(0.85 * (name_hits as f64 / parts.len() as f64));
        }
    }

    if score < 0.5 && !parts.is_empty() {
        let body_hits = parts.iter().filter(|p| text.contains(p.as_str())).count();
        if body_hits > 0 {
            score = score.max(0.4 * (body_hits as f64 / parts.len() as f64));
        }
    }

    (score * 10000.0).round() / 10000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use intel_core::{CriticStatus, ThreatLevel};

    fn candidate(source_name: &str, text: &str) -> EvidenceCandidate {
        EvidenceCandidate {
            source_id: Some(1),
            source_name: source_name.to_string(),
            source_url: String::new(),
            text: text.to_string(),
            recommendation: String::new(),
            threat_level: ThreatLevel::Low,
            confidence: 0.5,
            evidence_ref: String::new(),
            critic_status: CriticStatus::Approved,
            created_at: None,
            text_rank: 0.0,
            similarity_score: None,
        }
    }

    #[test]
    fn ticker_in_title_scores_highest() {
        let item = candidate("TSLA Q3 Earnings Beat", "strong quarter");
        assert_eq!(entity_relevance(Some("TSLA"), Some("Tesla Inc"), &item), 1.0);
    }

    #[test]
    fn short_ticker_nv_matches_verbatim() {
        let item = candidate("NV reports record sales", "details");
        assert_eq!(entity_relevance(Some("NV"), Some("Some Corp N.V."), &item), 1.0);
    }

    #[test]
    fn name_part_nv_in_longer_name_is_excluded_as_stopword() {
        let item = candidate("ASML Holding announces results", "body text");
        let score = entity_relevance(None, Some("ASML Holding N.V."), &item);
        assert!(score > 0.0, "asml should still match on the 'asml' part");
    }

    #[test]
    fn unrelated_item_scores_zero() {
        let item = candidate("Unrelated Co news", "nothing relevant here");
        assert_eq!(entity_relevance(Some("TSLA"), Some("Tesla Inc"), &item), 0.0);
    }

    #[test]
    fn no_ticker_or_name_is_neutral() {
        let item = candidate("Anything", "anything");
        assert_eq!(entity_relevance(None, None, &item), 0.5);
    }
}
