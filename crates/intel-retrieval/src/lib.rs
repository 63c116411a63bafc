//! Hybrid retrieval: merges full-text search, vector similarity search, and
//! graph-related-source lookup into one evidence candidate pool.

use std::collections::HashSet;

use intel_core::{EmbeddingClient, EvidenceCandidate, IntelResult, QueryContext};
use intel_repository::Repository;

pub struct RetrievalResult {
    pub candidates: Vec<EvidenceCandidate>,
    pub semantic_matches: usize,
    pub graph_related_sources: usize,
    pub connected_entities: Vec<String>,
}

/// Runs text, vector, and graph retrieval for `query_text` and merges them
/// into one candidate pool, per `core/pipeline/retrieval.py::_hybrid_retrieve`.
pub async fn hybrid_retrieve(
    repo: &dyn Repository,
    embedding_client: &EmbeddingClient,
    query_text: &str,
    query_context: &QueryContext,
    limit: i64,
) -> IntelResult<RetrievalResult> {
    let mut candidates: Vec<EvidenceCandidate> = repo
        .search_insights_by_text(query_text, limit.max(12))
        .await?
        .into_iter()
        .map(|(insight, text_rank)| EvidenceCandidate {
            source_id: Some(insight.source_id),
            source_name: insight.source_name,
            source_url: insight.source_url,
            text: insight.text,
            recommendation: insight.recommendation,
            threat_level: insight.threat_level,
            confidence: insight.confidence,
            evidence_ref: insight.evidence_ref,
            critic_status: insight.critic_status,
            created_at: Some(insight.created_at),
            text_rank,
            similarity_score: None,
        })
        .collect();

    let mut known_source_ids: HashSet<i64> = candidates.iter().filter_map(|c| c.source_id).collect();

    let query_vector = embedding_client.embed(query_text).await;
    let semantic_chunks = match repo.semantic_search(&query_vector, limit).await {
        Ok(chunks) => chunks,
        Err(error) => {
            tracing::warn!(%error, "semantic search failed");
            Vec::new()
        }
    };
    let semantic_matches = semantic_chunks.len();

    for (chunk, similarity) in semantic_chunks {
        if known_source_ids.contains(&chunk.source_id) {
            if let Some(existing) = candidates
                .iter_mut()
                .find(|c| c.source_id == Some(chunk.source_id) && c.similarity_score.is_none())
            {
                existing.similarity_score = Some(similarity);
            }
            continue;
        }
        known_source_ids.insert(chunk.source_id);
        candidates.push(EvidenceCandidate {
            source_id: Some(chunk.source_id),
            source_name: chunk.source_name,
            source_url: chunk.source_url,
            text: chunk.chunk_text,
            recommendation: String::new(),
            threat_level: intel_core::ThreatLevel::Low,
            confidence: (similarity * 10000.0).round() / 10000.0,
            evidence_ref: chunk.evidence_ref,
            critic_status: intel_core::CriticStatus::Approved,
            created_at: None,
            text_rank: 0.0,
            similarity_score: Some(similarity),
        });
    }

    let entity_name = query_context.entity.clone().unwrap_or_else(|| query_text.to_string());

    let graph_related = match repo.graph_related_sources(&entity_name, 10).await {
        Ok(related) => related,
        Err(error) => {
            tracing::warn!(%error, "graph search failed");
            Vec::new()
        }
    };

    let connected_entities = match repo.graph_connected_entities(&entity_name, 10).await {
        Ok(entities) => entities.into_iter().map(|(name, _hops)| name).collect(),
        Err(error) => {
            tracing::warn!(%error, "graph connected-entities lookup failed");
            Vec::new()
        }
    };

    Ok(RetrievalResult {
        candidates,
        semantic_matches,
        graph_related_sources: graph_related.len(),
        connected_entities,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use intel_core::{CriticStatus, ThreatLevel};

    fn sample_candidate(source_id: i64) -> EvidenceCandidate {
        EvidenceCandidate {
            source_id: Some(source_id),
            source_name: "SEC EDGAR".to_string(),
            source_url: "https://sec.gov/x".to_string(),
            text: "10-K filed".to_string(),
            recommendation: "review".to_string(),
            threat_level: ThreatLevel::Low,
            confidence: 0.6,
            evidence_ref: "https://sec.gov/x".to_string(),
            critic_status: CriticStatus::Approved,
            created_at: None,
            text_rank: 0.5,
            similarity_score: None,
        }
    }

    #[test]
    fn semantic_merge_attaches_similarity_to_existing_source() {
        let mut candidates = vec![sample_candidate(1)];
        let similarity = 0.87;
        if let Some(existing) = candidates
            .iter_mut()
            .find(|c| c.source_id == Some(1) && c.similarity_score.is_none())
        {
            existing.similarity_score = Some(similarity);
        }
        assert_eq!(candidates[0].similarity_score, Some(0.87));
    }
}
