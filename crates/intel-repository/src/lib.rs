mod audit;
mod schema;
mod sql;

pub use audit::AuditChainVerification;
pub use sql::SqlRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use intel_core::{
    ConnectorType, Entity, EntityCoverage, EntityFiling, FinancialPeriod, Insight, IntelResult,
    MacroObservation, MemoryChunk, PeriodType, SearchEvidence, SearchQuery, SocialSignal, Source,
    SourceEvidenceRelation, SourceSnapshot,
};
use serde::{Deserialize, Serialize};

/// How an entity lookup should match (§4.2 resolution order 1a/1b/1c).
#[derive(Debug, Clone)]
pub enum LookupKey<'a> {
    Ticker(&'a str),
    Name(&'a str),
    Alias(&'a str),
}

/// Fields to upsert for an entity. Empty/`None` fields never overwrite an
/// existing non-empty value — see `Entity` lifecycle invariant in §3.
#[derive(Debug, Clone, Default)]
pub struct EntityUpsert {
    pub name: String,
    pub ticker: String,
    pub cik: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub exchange: Option<String>,
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetentionSummary {
    pub insights_deleted: i64,
    pub snapshots_deleted: i64,
    pub search_deleted: i64,
    pub audit_deleted: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeletionSummary {
    pub snapshots_deleted: i64,
    pub insights_deleted: i64,
    pub memory_chunks_deleted: i64,
    pub evidence_relations_deleted: i64,
}

/// Typed read/write interface to the persistent store (C1). One
/// implementation, `SqlRepository`, runs the same code over Postgres in
/// production and SQLite in tests via `sqlx::AnyPool`.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn upsert_entity(&self, fields: EntityUpsert) -> IntelResult<Entity>;
    async fn lookup_entity(&self, key: LookupKey<'_>) -> IntelResult<Option<Entity>>;
    async fn autocomplete_entities(&self, prefix: &str, limit: i64) -> IntelResult<Vec<Entity>>;

    async fn add_source(
        &self,
        name: &str,
        url: &str,
        connector_type: ConnectorType,
    ) -> IntelResult<Source>;
    async fn get_source(&self, id: i64) -> IntelResult<Option<Source>>;
    async fn list_active_sources(&self) -> IntelResult<Vec<Source>>;
    async fn get_latest_snapshot_hash(&self, source_id: i64) -> IntelResult<Option<String>>;
    async fn get_last_ingest_time(&self, source_id: i64) -> IntelResult<Option<DateTime<Utc>>>;
    async fn insert_snapshot(&self, snapshot: &SourceSnapshot) -> IntelResult<()>;

    async fn insert_insight(&self, insight: &Insight) -> IntelResult<Insight>;
    async fn search_insights_by_text(
        &self,
        query: &str,
        limit: i64,
    ) -> IntelResult<Vec<(Insight, f64)>>;
    async fn semantic_search(
        &self,
        query_vec: &[f32],
        limit: i64,
    ) -> IntelResult<Vec<(MemoryChunk, f64)>>;
    async fn upsert_memory_chunk(&self, chunk: &MemoryChunk) -> IntelResult<()>;
    async fn upsert_graph_relationship(&self, relation: &SourceEvidenceRelation)
        -> IntelResult<()>;
    async fn graph_related_sources(
        &self,
        entity_name: &str,
        limit: i64,
    ) -> IntelResult<Vec<SourceEvidenceRelation>>;
    async fn graph_connected_entities(
        &self,
        entity_name: &str,
        limit: i64,
    ) -> IntelResult<Vec<(String, i64)>>;

    async fn upsert_financial_period(&self, period: &FinancialPeriod)
        -> IntelResult<FinancialPeriod>;
    async fn get_financial_history(
        &self,
        ticker: &str,
        period_type: PeriodType,
        limit: i64,
    ) -> IntelResult<Vec<FinancialPeriod>>;

    async fn upsert_macro(&self, obs: &MacroObservation) -> IntelResult<()>;
    async fn latest_macro_values(&self, ids: &[String]) -> IntelResult<Vec<MacroObservation>>;

    async fn upsert_social_signal(&self, signal: &SocialSignal) -> IntelResult<()>;
    async fn get_social_signals(&self, ticker: &str, days: i64) -> IntelResult<Vec<SocialSignal>>;

    async fn upsert_filing(&self, filing: &EntityFiling) -> IntelResult<()>;
    async fn get_filings(
        &self,
        ticker: &str,
        filing_type: Option<&str>,
        limit: i64,
    ) -> IntelResult<Vec<EntityFiling>>;

    async fn update_coverage(&self, entity_id: i64, ticker: &str) -> IntelResult<EntityCoverage>;
    async fn get_coverage(&self, ticker: &str) -> IntelResult<Option<EntityCoverage>>;

    async fn save_search_result(
        &self,
        query: &SearchQuery,
        evidence: &[SearchEvidence],
    ) -> IntelResult<i64>;
    async fn recent_search_results(&self, page: i64, page_size: i64) -> IntelResult<Vec<SearchQuery>>;

    async fn log_ingest_run(&self, source_id: i64, status: &str, detail: &str) -> IntelResult<()>;
    async fn log_failed_ingestion(
        &self,
        source_id: i64,
        error: &str,
        retryable: bool,
    ) -> IntelResult<()>;

    async fn run_retention_purge(
        &self,
        insights_days: u32,
        snapshots_days: u32,
        search_days: u32,
        audit_days: u32,
    ) -> IntelResult<RetentionSummary>;
    async fn delete_source_records(&self, source_id: i64) -> IntelResult<DeletionSummary>;

    async fn append_audit_event(
        &self,
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        detail: &str,
    ) -> IntelResult<()>;
    async fn verify_audit_chain(&self) -> IntelResult<AuditChainVerification>;
}
