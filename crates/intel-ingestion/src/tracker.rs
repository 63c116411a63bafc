use intel_core::ThreatLevel;

use crate::processing::{build_excerpt, hash_content};

pub struct ChangeEvaluation {
    pub content_hash: String,
    pub has_changed: bool,
    pub insight: String,
    pub threat_level: ThreatLevel,
    pub recommendation: String,
    pub excerpt: String,
}

/// SHA-256 change detection against the previous snapshot's hash.
pub fn evaluate_change(current_content: &str, previous_hash: Option<&str>) -> ChangeEvaluation {
    let current_hash = hash_content(current_content);
    let has_changed = previous_hash.map(|h| h != current_hash).unwrap_or(true);

    let (insight, threat_level, recommendation) = if previous_hash.is_none() {
        (
            "Initial baseline snapshot created for source.".to_string(),
            ThreatLevel::Low,
            "Continue monitoring for subsequent deltas.".to_string(),
        )
    } else if has_changed {
        (
            "Source content changed since last observation.".to_string(),
            ThreatLevel::Medium,
            "Review delta and validate business impact.".to_string(),
        )
    } else {
        (
            "No content delta detected in latest observation window.".to_string(),
            ThreatLevel::Low,
            "No immediate action required.".to_string(),
        )
    };

    ChangeEvaluation {
        excerpt: build_excerpt(current_content, 500),
        content_hash: current_hash,
        has_changed,
        insight,
        threat_level,
        recommendation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_observation_is_a_baseline() {
        let eval = evaluate_change("some content", None);
        assert!(eval.has_changed);
        assert_eq!(eval.threat_level, ThreatLevel::Low);
    }

    #[test]
    fn unchanged_content_is_not_flagged_as_changed() {
        let hash = super::hash_content("stable content");
        let eval = evaluate_change("stable content", Some(&hash));
        assert!(!eval.has_changed);
    }

    #[test]
    fn changed_content_is_flagged_medium() {
        let eval = evaluate_change("new content", Some("deadbeef"));
        assert!(eval.has_changed);
        assert_eq!(eval.threat_level, ThreatLevel::Medium);
    }
}
