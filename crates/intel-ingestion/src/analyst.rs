use intel_core::ThreatLevel;

pub struct Analysis {
    pub insight: String,
    pub threat_level: ThreatLevel,
    pub recommendation: String,
    pub confidence: f64,
    pub evidence_ref: String,
    pub evidence_excerpt: String,
}

/// Drafts an analyst note for a single ingested observation. Confidence is
/// fixed per case rather than modeled, matching the rule-based (not
/// learned) scoring used elsewhere in the pipeline.
pub fn build_analysis(source_name: &str, source_url: &str, has_changed: bool, excerpt: &str) -> Analysis {
    let (insight, threat_level, recommendation, confidence) = if has_changed {
        (
            format!("{source_name} shows a material content change worth triage."),
            ThreatLevel::Medium,
            "Cross-check the delta against prior filings and escalate if it touches guidance or risk factors."
                .to_string(),
            0.72,
        )
    } else {
        (
            format!("{source_name} is unchanged from the last observed snapshot."),
            ThreatLevel::Low,
            "No action needed; keep the source on its regular polling interval.".to_string(),
            0.61,
        )
    };

    Analysis {
        insight,
        threat_level,
        recommendation,
        confidence,
        evidence_ref: source_url.to_string(),
        evidence_excerpt: excerpt.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changed_content_yields_medium_threat_and_higher_confidence() {
        let analysis = build_analysis("Acme 10-K", "http://sec.gov/x", true, "excerpt");
        assert_eq!(analysis.threat_level, ThreatLevel::Medium);
        assert_eq!(analysis.confidence, 0.72);
    }

    #[test]
    fn unchanged_content_yields_low_threat_and_lower_confidence() {
        let analysis = build_analysis("Acme 10-K", "http://sec.gov/x", false, "excerpt");
        assert_eq!(analysis.threat_level, ThreatLevel::Low);
        assert_eq!(analysis.confidence, 0.61);
    }
}
