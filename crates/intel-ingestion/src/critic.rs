use intel_core::{CriticStatus, ThreatLevel};

use crate::analyst::Analysis;

pub struct CriticReview {
    pub critic_status: CriticStatus,
    pub confidence: f64,
    pub has_evidence: bool,
}

/// Flags an analysis for human review when confidence is low, evidence is
/// missing, or a high-threat call isn't backed by strong confidence.
pub fn review_analysis(analysis: &Analysis) -> CriticReview {
    let has_evidence = !analysis.evidence_ref.is_empty() && !analysis.evidence_excerpt.is_empty();

    let low_confidence_or_no_evidence = analysis.confidence < 0.55 || !has_evidence;
    let unsupported_high_threat = analysis.threat_level == ThreatLevel::High && analysis.confidence < 0.75;

    let critic_status = if low_confidence_or_no_evidence || unsupported_high_threat {
        CriticStatus::Flagged
    } else {
        CriticStatus::Approved
    };

    CriticReview {
        critic_status,
        confidence: analysis.confidence,
        has_evidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyst::build_analysis;

    #[test]
    fn unchanged_observation_with_evidence_is_approved() {
        let analysis = build_analysis("Acme", "http://x", false, "excerpt text");
        let review = review_analysis(&analysis);
        assert_eq!(review.critic_status, CriticStatus::Approved);
    }

    #[test]
    fn missing_evidence_is_flagged() {
        let analysis = build_analysis("Acme", "", true, "");
        let review = review_analysis(&analysis);
        assert_eq!(review.critic_status, CriticStatus::Flagged);
        assert!(!review.has_evidence);
    }

    #[test]
    fn high_threat_with_low_confidence_is_flagged() {
        let mut analysis = build_analysis("Acme", "http://x", true, "excerpt");
        analysis.threat_level = ThreatLevel::High;
        analysis.confidence = 0.6;
        let review = review_analysis(&analysis);
        assert_eq!(review.critic_status, CriticStatus::Flagged);
    }
}
