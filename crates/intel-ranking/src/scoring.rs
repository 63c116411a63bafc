use chrono::{DateTime, Utc};
use intel_core::{CriticStatus, EvidenceCandidate, QueryContext, RankedEvidenceItem};
use md5::{Digest, Md5};

use crate::entity_relevance::entity_relevance;

fn recency_score(created_at: Option<DateTime<Utc>>) -> f64 {
    let Some(created_at) = created_at else {
        return 0.0;
    };
    let age_hours = (Utc::now() - created_at).num_seconds().max(0) as f64 / 3600.0;
    1.0 / (1.0 + age_hours / 24.0)
}

fn source_quality_factor(source_name: &str, evidence_ref: &str) -> f64 {
    let source = source_name.to_lowercase();
    let reference = evidence_ref.to_lowercase();

    if source.contains("sec") || source.contains("edgar") || reference.contains("sec.gov") {
        1.0
    } else if source.contains("yahoo finance") || reference.contains("finance.yahoo.com") {
        0.98
    } else if source.contains("fmp") || source.contains("alpha vantage") {
        0.95
    } else if source.contains("google news") || reference.contains("news.google.com") {
        0.9
    } else if source.contains("rss") {
        0.85
    } else if source.contains("reddit") {
        0.7
    } else if source.contains("duckduckgo") {
        0.75
    } else {
        0.8
    }
}

fn token_relevance(tokens: &[String], text: &str, recommendation: &str) -> f64 {
    if tokens.is_empty() {
        return 0.0;
    }
    let haystack = format!("{text} {recommendation}").to_lowercase();
    let matches = tokens.iter().filter(|t| haystack.contains(t.as_str())).count();
    (matches as f64 / tokens.len() as f64).min(1.0)
}

fn md5_hex(text: &str) -> String {
    let digest = Md5::digest(text.as_bytes());
    hex::encode(digest)
}

pub struct RankingContext<'a> {
    pub tokens: &'a [String],
    pub ticker: Option<&'a str>,
    pub entity_name: Option<&'a str>,
    pub entity_sector: Option<&'a str>,
}

impl<'a> RankingContext<'a> {
    pub fn from_query(query_context: &'a QueryContext, tokens: &'a [String], entity_sector: Option<&'a str>) -> Self {
        Self {
            tokens,
            ticker: query_context.ticker.as_deref(),
            entity_name: query_context.entity.as_deref(),
            entity_sector,
        }
    }
}

/// Scores, sorts, and dedupes retrieval candidates into ranked evidence,
/// per `core/pipeline/ranking.py::_rank_items`.
pub fn rank_evidence(candidates: Vec<EvidenceCandidate>, ctx: &RankingContext<'_>) -> Vec<RankedEvidenceItem> {
    let mut ranked: Vec<RankedEvidenceItem> = candidates
        .iter()
        .map(|item| {
            let recency = recency_score(item.created_at);
            let critic_factor = if item.critic_status == CriticStatus::Approved { 1.0 } else { 0.5 };
            let source_factor = source_quality_factor(&item.source_name, &item.evidence_ref);
            let token_rel = token_relevance(ctx.tokens, &item.text, &item.recommendation);
            let semantic_score = item.similarity_score.unwrap_or(0.0);
            let rel = entity_relevance(ctx.ticker, ctx.entity_name, item);

            let mut sector_penalty = 1.0;
            if let Some(sector) = ctx.entity_sector {
                if sector.len() > 3 && item.text.to_lowercase().contains(&sector.to_lowercase()) {
                    sector_penalty = 1.1;
                }
            }

            let mut pollution_penalty = 1.0;
            let src_name_lower = item.source_name.to_lowercase();
            if src_name_lower.contains("google news:") || src_name_lower.contains("yahoo finance news:") {
                if let Some(entity_name) = ctx.entity_name {
                    if !src_name_lower.contains(&entity_name.to_lowercase()) {
                        pollution_penalty = 0.2;
                    }
                }
            }

            let mut rank_score = 0.35 * rel
                + 0.15 * source_factor
                + 0.15 * item.confidence
                + 0.10 * semantic_score
                + 0.10 * item.text_rank
                + 0.10 * token_rel
                + 0.05 * recency;
            rank_score *= critic_factor * sector_penalty * pollution_penalty;

            RankedEvidenceItem {
                source_name: item.source_name.clone(),
                source_url: item.source_url.clone(),
                text: item.text.clone(),
                recommendation: item.recommendation.clone(),
                threat_level: item.threat_level,
                confidence: item.confidence,
                evidence_ref: item.evidence_ref.clone(),
                critic_status: item.critic_status,
                created_at: item.created_at.unwrap_or_else(|| Utc::now()),
                text_rank: item.text_rank,
                semantic_score: item.similarity_score,
                entity_relevance: rel,
                rank_score: (rank_score * 10000.0).round() / 10000.0,
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.rank_score.partial_cmp(&a.rank_score).unwrap_or(std::cmp::Ordering::Equal));

    let relevant: Vec<RankedEvidenceItem> = ranked.iter().filter(|r| r.entity_relevance > 0.3).cloned().collect();
    if relevant.len() >= 3 {
        ranked = relevant;
    }

    let mut seen: std::collections::HashMap<String, RankedEvidenceItem> = std::collections::HashMap::new();
    for item in ranked {
        let insight_excerpt: String = item.text.chars().take(200).collect::<String>().trim().to_lowercase();
        let dedup_key = format!("{}::{}", item.source_name, md5_hex(&insight_excerpt));
        match seen.get(&dedup_key) {
            Some(existing) if existing.rank_score >= item.rank_score => {}
            _ => {
                seen.insert(dedup_key, item);
            }
        }
    }

    let mut deduped: Vec<RankedEvidenceItem> = seen.into_values().collect();
    deduped.sort_by(|a, b| b.rank_score.partial_cmp(&a.rank_score).unwrap_or(std::cmp::Ordering::Equal));
    deduped
}

#[cfg(test)]
mod tests {
    use super::*;
    use intel_core::ThreatLevel;

    fn candidate(source_name: &str, text: &str, confidence: f64) -> EvidenceCandidate {
        EvidenceCandidate {
            source_id: Some(1),
            source_name: source_name.to_string(),
            source_url: String::new(),
            text: text.to_string(),
            recommendation: String::new(),
            threat_level: ThreatLevel::Low,
            confidence,
            evidence_ref: String::new(),
            critic_status: CriticStatus::Approved,
            created_at: Some(Utc::now()),
            text_rank: 0.5,
            similarity_score: None,
        }
    }

    #[test]
    fn higher_entity_relevance_ranks_first() {
        let tsla = candidate("TSLA earnings beat", "strong quarter", 0.6);
        let unrelated = candidate("Unrelated Co news", "nothing relevant", 0.6);
        let tokens = vec![];
        let ctx = RankingContext {
            tokens: &tokens,
            ticker: Some("TSLA"),
            entity_name: Some("Tesla Inc"),
            entity_sector: None,
        };
        let ranked = rank_evidence(vec![unrelated, tsla], &ctx);
        assert_eq!(ranked[0].source_name, "TSLA earnings beat");
    }

    #[test]
    fn dedup_keeps_highest_scored_duplicate() {
        let a = candidate("Acme Wire", "revenue beats estimates by a wide margin", 0.9);
        let b = candidate("Acme Wire", "revenue beats estimates by a wide margin", 0.3);
        let tokens = vec![];
        let ctx = RankingContext {
            tokens: &tokens,
            ticker: None,
            entity_name: None,
            entity_sector: None,
        };
        let ranked = rank_evidence(vec![a, b], &ctx);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].confidence, 0.9);
    }
}
