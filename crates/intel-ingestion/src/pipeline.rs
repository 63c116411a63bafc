use chrono::Utc;
use intel_core::{EmbeddingClient, IntelError, IntelResult, Insight, MemoryChunk, Settings, SourceEvidenceRelation, SourceSnapshot};
use intel_repository::Repository;
use reqwest::Client;

use crate::analyst::build_analysis;
use crate::connectors::get_connector;
use crate::critic::review_analysis;
use crate::pii::redact_pii;
use crate::policy::validate_source_policy;
use crate::processing::{chunk_text, normalize_content};
use crate::tracker::evaluate_change;

const CHUNK_SIZE: usize = 500;
const CHUNK_OVERLAP: usize = 100;
const MAX_MEMORY_CHUNKS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestStatus {
    Completed,
    Skipped,
    Blocked,
}

pub struct IngestOutcome {
    pub source_id: i64,
    pub status: IngestStatus,
    pub has_changed: bool,
    pub content_hash: Option<String>,
    pub critic_status: Option<String>,
    pub confidence: Option<f64>,
    pub chunk_count: usize,
}

/// Runs one ingestion cycle for `source_id`: fetch, diff against the last
/// snapshot, redact, analyze, critique, persist. Best-effort memory/graph
/// writes never fail the run; they degrade to a `memory=degraded` status
/// logged alongside the run outcome.
pub async fn execute_ingest(
    repo: &dyn Repository,
    settings: &Settings,
    embedding_client: &EmbeddingClient,
    http_client: &Client,
    source_id: i64,
    force_refresh: bool,
) -> IntelResult<IngestOutcome> {
    let source = repo
        .get_source(source_id)
        .await?
        .ok_or_else(|| IntelError::NotFound(format!("source {source_id}")))?;

    if !force_refresh {
        if let Some(last_ingest) = repo.get_last_ingest_time(source_id).await? {
            let elapsed = (Utc::now() - last_ingest).num_seconds().max(0) as u64;
            if elapsed < settings.ingest_min_interval_seconds {
                repo.log_ingest_run(source_id, "skipped", "too_soon").await?;
                return Ok(IngestOutcome {
                    source_id,
                    status: IngestStatus::Skipped,
                    has_changed: false,
                    content_hash: None,
                    critic_status: None,
                    confidence: None,
                    chunk_count: 0,
                });
            }
        }
    }

    let decision = validate_source_policy(&source.url, http_client, settings).await;
    if !decision.allowed {
        repo.log_ingest_run(source_id, "blocked", &decision.reason).await?;
        return Ok(IngestOutcome {
            source_id,
            status: IngestStatus::Blocked,
            has_changed: false,
            content_hash: None,
            critic_status: None,
            confidence: None,
            chunk_count: 0,
        });
    }

    let connector = get_connector(source.connector_type, &settings.ingest_user_agent);
    let raw_content = match connector.fetch(&source.url).await {
        Ok(content) => content,
        Err(error) => {
            repo.log_failed_ingestion(source_id, &error.to_string(), error.retryable())
                .await?;
            return Err(error);
        }
    };

    let normalized = normalize_content(&raw_content, &source.url);
    let chunks = chunk_text(&normalized, CHUNK_SIZE, CHUNK_OVERLAP);

    let previous_hash = repo.get_latest_snapshot_hash(source_id).await?;
    let change = evaluate_change(&normalized, previous_hash.as_deref());

    let redacted_excerpt = redact_pii(&change.excerpt);
    let redacted_chunks: Vec<String> = chunks.iter().map(|c| redact_pii(c)).collect();

    let analysis = build_analysis(&source.name, &source.url, change.has_changed, &redacted_excerpt);
    let review = review_analysis(&analysis);

    repo.insert_snapshot(&SourceSnapshot {
        source_id,
        content_hash: change.content_hash.clone(),
        excerpt: redacted_excerpt.clone(),
        observed_at: Utc::now(),
    })
    .await?;

    let mut memory_status = "skipped";

    if change.has_changed {
        repo.insert_insight(&Insight {
            id: None,
            source_id,
            source_name: source.name.clone(),
            source_url: source.url.clone(),
            text: analysis.insight.clone(),
            recommendation: analysis.recommendation.clone(),
            threat_level: analysis.threat_level,
            confidence: analysis.confidence,
            evidence_ref: analysis.evidence_ref.clone(),
            content_hash: change.content_hash.clone(),
            critic_status: review.critic_status,
            created_at: Utc::now(),
        })
        .await?;

        memory_status = match persist_memory(
            repo,
            embedding_client,
            source_id,
            &source.name,
            &source.url,
            &change.content_hash,
            &redacted_chunks,
            analysis.threat_level,
            &analysis.evidence_ref,
        )
        .await
        {
            Ok(()) => "ok",
            Err(error) => {
                repo.log_failed_ingestion(source_id, &error.to_string(), true).await?;
                "degraded"
            }
        };
    }

    let detail = format!(
        "changed={};critic_status={:?};memory={}",
        change.has_changed, review.critic_status, memory_status
    );
    repo.log_ingest_run(source_id, "completed", &detail).await?;

    Ok(IngestOutcome {
        source_id,
        status: IngestStatus::Completed,
        has_changed: change.has_changed,
        content_hash: Some(change.content_hash),
        critic_status: Some(format!("{:?}", review.critic_status)),
        confidence: Some(review.confidence),
        chunk_count: redacted_chunks.len(),
    })
}

#[allow(clippy::too_many_arguments)]
async fn persist_memory(
    repo: &dyn Repository,
    embedding_client: &EmbeddingClient,
    source_id: i64,
    source_name: &str,
    source_url: &str,
    content_hash: &str,
    chunks: &[String],
    threat_level: intel_core::ThreatLevel,
    evidence_ref: &str,
) -> IntelResult<()> {
    let texts: Vec<String> = if chunks.is_empty() {
        vec![content_hash.to_string()]
    } else {
        chunks.iter().take(MAX_MEMORY_CHUNKS).cloned().collect()
    };

    let embeddings = embedding_client.embed_batch(&texts).await;

    for (index, (text, embedding)) in texts.iter().zip(embeddings.into_iter()).enumerate() {
        repo.upsert_memory_chunk(&MemoryChunk {
            source_id,
            source_name: source_name.to_string(),
            source_url: source_url.to_string(),
            content_hash: content_hash.to_string(),
            chunk_index: index as i32,
            chunk_text: text.clone(),
            evidence_ref: evidence_ref.to_string(),
            embedding,
        })
        .await?;
    }

    repo.upsert_graph_relationship(&SourceEvidenceRelation {
        source_id,
        evidence_ref: evidence_ref.to_string(),
        threat_level,
    })
    .await
}
