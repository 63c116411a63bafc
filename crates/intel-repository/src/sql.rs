use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use intel_core::{
    BalanceSheet, CashFlowStatement, ConnectorType, Entity, EntityCoverage, EntityType,
    EntityFiling, FinancialPeriod, IncomeStatement, Insight, IntelError, IntelResult, KeyMetrics,
    MacroObservation, MemoryChunk, PeriodType, SearchEvidence, SearchQuery, SocialSignal, Source,
    SourceEvidenceRelation, SourceSnapshot, ThreatLevel, CriticStatus,
};
use sqlx::{AnyPool, Row};

use crate::{
    audit, schema, AuditChainVerification, DeletionSummary, EntityUpsert, LookupKey, Repository,
    RetentionSummary,
};

/// `Repository` over `sqlx::AnyPool` — same queries run against Postgres in
/// production and in-memory SQLite in tests.
pub struct SqlRepository {
    pool: AnyPool,
}

impl SqlRepository {
    pub async fn connect(database_url: &str) -> IntelResult<Self> {
        let pool = AnyPool::connect(database_url)
            .await
            .map_err(|e| IntelError::Repository(format!("connect failed: {e}")))?;
        schema::ensure_schema(&pool)
            .await
            .map_err(|e| IntelError::Repository(format!("schema init failed: {e}")))?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: AnyPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }
}

fn entity_type_str(t: EntityType) -> &'static str {
    match t {
        EntityType::Company => "company",
        EntityType::Etf => "etf",
    }
}

fn parse_entity_type(s: &str) -> EntityType {
    match s {
        "etf" => EntityType::Etf,
        _ => EntityType::Company,
    }
}

fn period_type_str(t: PeriodType) -> &'static str {
    match t {
        PeriodType::Quarterly => "quarterly",
        PeriodType::Annual => "annual",
    }
}

fn parse_period_type(s: &str) -> PeriodType {
    match s {
        "annual" => PeriodType::Annual,
        _ => PeriodType::Quarterly,
    }
}

fn threat_level_str(t: ThreatLevel) -> &'static str {
    t.as_str()
}

fn parse_threat_level(s: &str) -> ThreatLevel {
    match s {
        "high" => ThreatLevel::High,
        "medium" => ThreatLevel::Medium,
        _ => ThreatLevel::Low,
    }
}

fn critic_status_str(c: CriticStatus) -> &'static str {
    match c {
        CriticStatus::Approved => "approved",
        CriticStatus::Flagged => "flagged",
    }
}

fn parse_critic_status(s: &str) -> CriticStatus {
    match s {
        "flagged" => CriticStatus::Flagged,
        _ => CriticStatus::Approved,
    }
}

fn connector_type_str(c: ConnectorType) -> &'static str {
    match c {
        ConnectorType::Web => "web",
        ConnectorType::Rss => "rss",
    }
}

fn parse_connector_type(s: &str) -> ConnectorType {
    match s {
        "rss" => ConnectorType::Rss,
        _ => ConnectorType::Web,
    }
}

fn map_sqlx(context: &str) -> impl Fn(sqlx::Error) -> IntelError + '_ {
    move |e| IntelError::Repository(format!("{context}: {e}"))
}

fn row_to_entity(row: &sqlx::any::AnyRow) -> Result<Entity, sqlx::Error> {
    let aliases_json: String = row.try_get("aliases")?;
    let aliases: BTreeSet<String> = serde_json::from_str(&aliases_json).unwrap_or_default();
    let entity_type_raw: String = row.try_get("entity_type")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;
    Ok(Entity {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        ticker: row.try_get("ticker")?,
        cik: row.try_get("cik").ok(),
        sector: row.try_get("sector").ok(),
        industry: row.try_get("industry").ok(),
        exchange: row.try_get("exchange").ok(),
        entity_type: parse_entity_type(&entity_type_raw),
        aliases,
        created_at: created_at
            .parse::<DateTime<Utc>>()
            .unwrap_or_else(|_| Utc::now()),
        updated_at: updated_at
            .parse::<DateTime<Utc>>()
            .unwrap_or_else(|_| Utc::now()),
    })
}

#[async_trait]
impl Repository for SqlRepository {
    async fn upsert_entity(&self, fields: EntityUpsert) -> IntelResult<Entity> {
        let now = Utc::now().to_rfc3339();
        let existing: Option<sqlx::any::AnyRow> =
            sqlx::query("SELECT * FROM entities WHERE ticker = ?")
                .bind(&fields.ticker)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx("upsert_entity lookup"))?;

        let mut aliases: BTreeSet<String> = fields.aliases.iter().cloned().collect();
        aliases.insert(fields.name.to_lowercase());
        aliases.insert(fields.ticker.to_lowercase());

        if let Some(row) = existing {
            let mut current = row_to_entity(&row).map_err(map_sqlx("upsert_entity decode"))?;
            current.aliases.extend(aliases);
            let sector = fields.sector.or(current.sector.clone());
            let industry = fields.industry.or(current.industry.clone());
            let exchange = fields.exchange.or(current.exchange.clone());
            let cik = fields.cik.or(current.cik.clone());
            let aliases_json = serde_json::to_string(&current.aliases).unwrap_or_default();

            sqlx::query(
                "UPDATE entities SET name = ?, cik = ?, sector = ?, industry = ?, exchange = ?, aliases = ?, updated_at = ? WHERE id = ?",
            )
            .bind(&fields.name)
            .bind(&cik)
            .bind(&sector)
            .bind(&industry)
            .bind(&exchange)
            .bind(&aliases_json)
            .bind(&now)
            .bind(current.id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx("upsert_entity update"))?;

            current.name = fields.name;
            current.cik = cik;
            current.sector = sector;
            current.industry = industry;
            current.exchange = exchange;
            current.updated_at = now.parse().unwrap_or_else(|_| Utc::now());
            self.append_audit_event("entity_upsert", "entity", &current.id.to_string(), &format!("ticker={}", current.ticker))
                .await?;
            Ok(current)
        } else {
            let aliases_json = serde_json::to_string(&aliases).unwrap_or_default();
            let row: (i64,) = sqlx::query_as(
                "INSERT INTO entities (name, ticker, cik, sector, industry, exchange, entity_type, aliases, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, 'company', ?, ?, ?) RETURNING id",
            )
            .bind(&fields.name)
            .bind(&fields.ticker)
            .bind(&fields.cik)
            .bind(&fields.sector)
            .bind(&fields.industry)
            .bind(&fields.exchange)
            .bind(&aliases_json)
            .bind(&now)
            .bind(&now)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx("upsert_entity insert"))?;

            self.append_audit_event("entity_upsert", "entity", &row.0.to_string(), &format!("ticker={}", fields.ticker))
                .await?;

            Ok(Entity {
                id: row.0,
                name: fields.name,
                ticker: fields.ticker,
                cik: fields.cik,
                sector: fields.sector,
                industry: fields.industry,
                exchange: fields.exchange,
                entity_type: EntityType::Company,
                aliases,
                created_at: now.parse().unwrap_or_else(|_| Utc::now()),
                updated_at: now.parse().unwrap_or_else(|_| Utc::now()),
            })
        }
    }

    async fn lookup_entity(&self, key: LookupKey<'_>) -> IntelResult<Option<Entity>> {
        let row = match key {
            LookupKey::Ticker(t) => sqlx::query("SELECT * FROM entities WHERE ticker = ?")
                .bind(t.to_uppercase())
                .fetch_optional(&self.pool)
                .await,
            LookupKey::Name(n) => sqlx::query("SELECT * FROM entities WHERE LOWER(name) = LOWER(?)")
                .bind(n)
                .fetch_optional(&self.pool)
                .await,
            LookupKey::Alias(a) => {
                sqlx::query("SELECT * FROM entities WHERE aliases LIKE ?")
                    .bind(format!("%\"{}\"%", a.to_lowercase()))
                    .fetch_optional(&self.pool)
                    .await
            }
        }
        .map_err(map_sqlx("lookup_entity"))?;

        row.map(|r| row_to_entity(&r).map_err(map_sqlx("lookup_entity decode")))
            .transpose()
    }

    async fn autocomplete_entities(&self, prefix: &str, limit: i64) -> IntelResult<Vec<Entity>> {
        let rows = sqlx::query(
            "SELECT * FROM entities WHERE ticker LIKE ? OR LOWER(name) LIKE LOWER(?) ORDER BY ticker LIMIT ?",
        )
        .bind(format!("{}%", prefix.to_uppercase()))
        .bind(format!("{prefix}%"))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx("autocomplete_entities"))?;

        rows.iter()
            .map(|r| row_to_entity(r).map_err(map_sqlx("autocomplete_entities decode")))
            .collect()
    }

    async fn add_source(
        &self,
        name: &str,
        url: &str,
        connector_type: ConnectorType,
    ) -> IntelResult<Source> {
        let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM sources WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx("add_source lookup"))?;

        let id = if let Some((id,)) = existing {
            id
        } else {
            let row: (i64,) = sqlx::query_as(
                "INSERT INTO sources (name, url, connector_type) VALUES (?, ?, ?) RETURNING id",
            )
            .bind(name)
            .bind(url)
            .bind(connector_type_str(connector_type))
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx("add_source insert"))?;
            row.0
        };

        self.append_audit_event("source_add", "source", &id.to_string(), url)
            .await?;

        Ok(Source {
            id,
            name: name.to_string(),
            url: url.to_string(),
            connector_type,
            deleted_at: None,
        })
    }

    async fn get_source(&self, id: i64) -> IntelResult<Option<Source>> {
        let row: Option<(i64, String, String, String, Option<String>)> = sqlx::query_as(
            "SELECT id, name, url, connector_type, deleted_at FROM sources WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx("get_source"))?;

        Ok(row.map(|(id, name, url, ct, deleted_at)| Source {
            id,
            name,
            url,
            connector_type: parse_connector_type(&ct),
            deleted_at: deleted_at.and_then(|s| s.parse().ok()),
        }))
    }

    async fn list_active_sources(&self) -> IntelResult<Vec<Source>> {
        let rows: Vec<(i64, String, String, String, Option<String>)> = sqlx::query_as(
            "SELECT id, name, url, connector_type, deleted_at FROM sources WHERE deleted_at IS NULL ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx("list_active_sources"))?;

        Ok(rows
            .into_iter()
            .map(|(id, name, url, ct, deleted_at)| Source {
                id,
                name,
                url,
                connector_type: parse_connector_type(&ct),
                deleted_at: deleted_at.and_then(|s| s.parse().ok()),
            })
            .collect())
    }

    async fn get_latest_snapshot_hash(&self, source_id: i64) -> IntelResult<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT content_hash FROM source_snapshots WHERE source_id = ? ORDER BY observed_at DESC LIMIT 1",
        )
        .bind(source_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx("get_latest_snapshot_hash"))?;
        Ok(row.map(|(h,)| h))
    }

    async fn get_last_ingest_time(&self, source_id: i64) -> IntelResult<Option<DateTime<Utc>>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT created_at FROM ingest_runs WHERE source_id = ? ORDER BY created_at DESC LIMIT 1",
        )
        .bind(source_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx("get_last_ingest_time"))?;
        Ok(row.and_then(|(t,)| t.parse().ok()))
    }

    async fn insert_snapshot(&self, snapshot: &SourceSnapshot) -> IntelResult<()> {
        sqlx::query(
            "INSERT INTO source_snapshots (source_id, content_hash, excerpt, observed_at) VALUES (?, ?, ?, ?)",
        )
        .bind(snapshot.source_id)
        .bind(&snapshot.content_hash)
        .bind(&snapshot.excerpt)
        .bind(snapshot.observed_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx("insert_snapshot"))?;
        self.append_audit_event("snapshot_insert", "source", &snapshot.source_id.to_string(), &snapshot.content_hash)
            .await?;
        Ok(())
    }

    async fn insert_insight(&self, insight: &Insight) -> IntelResult<Insight> {
        let row: (i64,) = sqlx::query_as(
            "INSERT INTO insights
                (source_id, source_name, source_url, text, recommendation, threat_level, confidence, evidence_ref, content_hash, critic_status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(insight.source_id)
        .bind(&insight.source_name)
        .bind(&insight.source_url)
        .bind(&insight.text)
        .bind(&insight.recommendation)
        .bind(threat_level_str(insight.threat_level))
        .bind(insight.confidence)
        .bind(&insight.evidence_ref)
        .bind(&insight.content_hash)
        .bind(critic_status_str(insight.critic_status))
        .bind(insight.created_at.to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx("insert_insight"))?;

        self.append_audit_event(
            "insight_insert",
            "insight",
            &row.0.to_string(),
            &format!("source_id={} threat_level={}", insight.source_id, threat_level_str(insight.threat_level)),
        )
        .await?;

        let mut result = insight.clone();
        result.id = Some(row.0);
        Ok(result)
    }

    async fn search_insights_by_text(
        &self,
        query: &str,
        limit: i64,
    ) -> IntelResult<Vec<(Insight, f64)>> {
        let like = format!("%{query}%");
        let rows = sqlx::query(
            "SELECT * FROM insights WHERE text LIKE ? ORDER BY created_at DESC LIMIT ?",
        )
        .bind(&like)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx("search_insights_by_text"))?;

        let query_lower = query.to_lowercase();
        rows.iter()
            .map(|r| {
                let text: String = r.try_get("text").map_err(map_sqlx("row text"))?;
                let occurrences = text.to_lowercase().matches(&query_lower).count() as f64;
                let insight = Insight {
                    id: r.try_get("id").ok(),
                    source_id: r.try_get("source_id").map_err(map_sqlx("row source_id"))?,
                    source_name: r.try_get("source_name").map_err(map_sqlx("row source_name"))?,
                    source_url: r.try_get("source_url").map_err(map_sqlx("row source_url"))?,
                    text: text.clone(),
                    recommendation: r
                        .try_get("recommendation")
                        .map_err(map_sqlx("row recommendation"))?,
                    threat_level: parse_threat_level(
                        &r.try_get::<String, _>("threat_level")
                            .map_err(map_sqlx("row threat_level"))?,
                    ),
                    confidence: r.try_get("confidence").map_err(map_sqlx("row confidence"))?,
                    evidence_ref: r
                        .try_get("evidence_ref")
                        .map_err(map_sqlx("row evidence_ref"))?,
                    content_hash: r
                        .try_get("content_hash")
                        .map_err(map_sqlx("row content_hash"))?,
                    critic_status: parse_critic_status(
                        &r.try_get::<String, _>("critic_status")
                            .map_err(map_sqlx("row critic_status"))?,
                    ),
                    created_at: r
                        .try_get::<String, _>("created_at")
                        .map_err(map_sqlx("row created_at"))?
                        .parse()
                        .unwrap_or_else(|_| Utc::now()),
                };
                Ok((insight, occurrences))
            })
            .collect()
    }

    async fn semantic_search(
        &self,
        query_vec: &[f32],
        limit: i64,
    ) -> IntelResult<Vec<(MemoryChunk, f64)>> {
        let rows = sqlx::query("SELECT * FROM memory_chunks")
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx("semantic_search"))?;

        let mut scored: Vec<(MemoryChunk, f64)> = rows
            .iter()
            .map(|r| {
                let embedding_json: String =
                    r.try_get("embedding").map_err(map_sqlx("row embedding"))?;
                let embedding: Vec<f32> = serde_json::from_str(&embedding_json).unwrap_or_default();
                let chunk = MemoryChunk {
                    source_id: r.try_get("source_id").map_err(map_sqlx("row source_id"))?,
                    source_name: r.try_get("source_name").map_err(map_sqlx("row source_name"))?,
                    source_url: r.try_get("source_url").map_err(map_sqlx("row source_url"))?,
                    content_hash: r
                        .try_get("content_hash")
                        .map_err(map_sqlx("row content_hash"))?,
                    chunk_index: r.try_get("chunk_index").map_err(map_sqlx("row chunk_index"))?,
                    chunk_text: r.try_get("chunk_text").map_err(map_sqlx("row chunk_text"))?,
                    evidence_ref: r
                        .try_get("evidence_ref")
                        .map_err(map_sqlx("row evidence_ref"))?,
                    embedding: embedding.clone(),
                };
                let score = cosine_similarity(query_vec, &embedding);
                Ok((chunk, score))
            })
            .collect::<IntelResult<Vec<_>>>()?;

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit.max(0) as usize);
        Ok(scored)
    }

    async fn upsert_memory_chunk(&self, chunk: &MemoryChunk) -> IntelResult<()> {
        let embedding_json = serde_json::to_string(&chunk.embedding).unwrap_or_default();
        sqlx::query(
            "INSERT INTO memory_chunks
                (source_id, source_name, source_url, content_hash, chunk_index, chunk_text, evidence_ref, embedding)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (source_id, content_hash, chunk_index)
             DO UPDATE SET chunk_text = excluded.chunk_text, embedding = excluded.embedding",
        )
        .bind(chunk.source_id)
        .bind(&chunk.source_name)
        .bind(&chunk.source_url)
        .bind(&chunk.content_hash)
        .bind(chunk.chunk_index)
        .bind(&chunk.chunk_text)
        .bind(&chunk.evidence_ref)
        .bind(&embedding_json)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx("upsert_memory_chunk"))?;
        Ok(())
    }

    async fn upsert_graph_relationship(
        &self,
        relation: &SourceEvidenceRelation,
    ) -> IntelResult<()> {
        sqlx::query(
            "INSERT INTO source_evidence_relations (source_id, evidence_ref, threat_level)
             VALUES (?, ?, ?)
             ON CONFLICT (source_id, evidence_ref) DO UPDATE SET threat_level = excluded.threat_level",
        )
        .bind(relation.source_id)
        .bind(&relation.evidence_ref)
        .bind(threat_level_str(relation.threat_level))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx("upsert_graph_relationship"))?;
        Ok(())
    }

    async fn graph_related_sources(
        &self,
        entity_name: &str,
        limit: i64,
    ) -> IntelResult<Vec<SourceEvidenceRelation>> {
        let like = format!("%{entity_name}%");
        let rows = sqlx::query(
            "SELECT r.source_id, r.evidence_ref, r.threat_level
             FROM source_evidence_relations r
             JOIN sources s ON s.id = r.source_id
             WHERE s.name LIKE ? LIMIT ?",
        )
        .bind(&like)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx("graph_related_sources"))?;

        rows.iter()
            .map(|r| {
                Ok(SourceEvidenceRelation {
                    source_id: r.try_get("source_id").map_err(map_sqlx("row source_id"))?,
                    evidence_ref: r
                        .try_get("evidence_ref")
                        .map_err(map_sqlx("row evidence_ref"))?,
                    threat_level: parse_threat_level(
                        &r.try_get::<String, _>("threat_level")
                            .map_err(map_sqlx("row threat_level"))?,
                    ),
                })
            })
            .collect()
    }

    async fn graph_connected_entities(
        &self,
        entity_name: &str,
        limit: i64,
    ) -> IntelResult<Vec<(String, i64)>> {
        let like = format!("%{entity_name}%");
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT s.name, COUNT(*) as c
             FROM source_evidence_relations r
             JOIN sources s ON s.id = r.source_id
             WHERE s.name NOT LIKE ?
             GROUP BY s.name ORDER BY c DESC LIMIT ?",
        )
        .bind(&like)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx("graph_connected_entities"))?;
        Ok(rows)
    }

    async fn upsert_financial_period(
        &self,
        period: &FinancialPeriod,
    ) -> IntelResult<FinancialPeriod> {
        let existing: Option<sqlx::any::AnyRow> = sqlx::query(
            "SELECT * FROM financial_periods WHERE ticker = ? AND period_type = ? AND period_end = ? AND source_provider = ?",
        )
        .bind(&period.ticker)
        .bind(period_type_str(period.period_type))
        .bind(period.period_end.to_string())
        .bind(&period.source_provider)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx("upsert_financial_period lookup"))?;

        let merged = if let Some(row) = existing {
            let prior = row_to_financial_period(&row).map_err(map_sqlx("decode period"))?;
            prior.deep_merge(period)
        } else {
            period.clone()
        };

        let income_json = serde_json::to_string(&merged.income).unwrap_or_default();
        let balance_json = serde_json::to_string(&merged.balance).unwrap_or_default();
        let cash_flow_json = serde_json::to_string(&merged.cash_flow).unwrap_or_default();
        let key_metrics_json = serde_json::to_string(&merged.key_metrics).unwrap_or_default();

        let row: (i64,) = sqlx::query_as(
            "INSERT INTO financial_periods
                (ticker, entity_id, period_type, period_end, fiscal_year, fiscal_quarter, source_provider, income, balance, cash_flow, key_metrics)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (ticker, period_type, period_end, source_provider)
             DO UPDATE SET income = excluded.income, balance = excluded.balance, cash_flow = excluded.cash_flow, key_metrics = excluded.key_metrics, fiscal_quarter = excluded.fiscal_quarter
             RETURNING id",
        )
        .bind(&merged.ticker)
        .bind(merged.entity_id)
        .bind(period_type_str(merged.period_type))
        .bind(merged.period_end.to_string())
        .bind(merged.fiscal_year)
        .bind(merged.fiscal_quarter)
        .bind(&merged.source_provider)
        .bind(&income_json)
        .bind(&balance_json)
        .bind(&cash_flow_json)
        .bind(&key_metrics_json)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx("upsert_financial_period write"))?;

        self.append_audit_event(
            "financial_period_upsert",
            "financial_period",
            &row.0.to_string(),
            &format!("ticker={} period_end={}", merged.ticker, merged.period_end),
        )
        .await?;

        let mut result = merged;
        result.id = Some(row.0);
        Ok(result)
    }

    async fn get_financial_history(
        &self,
        ticker: &str,
        period_type: PeriodType,
        limit: i64,
    ) -> IntelResult<Vec<FinancialPeriod>> {
        let rows = sqlx::query(
            "SELECT * FROM financial_periods WHERE ticker = ? AND period_type = ? ORDER BY period_end DESC LIMIT ?",
        )
        .bind(ticker)
        .bind(period_type_str(period_type))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx("get_financial_history"))?;

        rows.iter()
            .map(|r| row_to_financial_period(r).map_err(map_sqlx("decode period")))
            .collect()
    }

    async fn upsert_macro(&self, obs: &MacroObservation) -> IntelResult<()> {
        sqlx::query(
            "INSERT INTO macro_observations (series_id, series_name, observation_date, value)
             VALUES (?, ?, ?, ?)
             ON CONFLICT (series_id, observation_date) DO UPDATE SET value = excluded.value, series_name = excluded.series_name",
        )
        .bind(&obs.series_id)
        .bind(&obs.series_name)
        .bind(obs.date.to_string())
        .bind(obs.value)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx("upsert_macro"))?;
        self.append_audit_event("macro_upsert", "macro_observation", &obs.series_id, &obs.date.to_string())
            .await?;
        Ok(())
    }

    async fn latest_macro_values(&self, ids: &[String]) -> IntelResult<Vec<MacroObservation>> {
        let mut out = Vec::with_capacity(ids.len());
        for series_id in ids {
            let row: Option<(String, String, String, f64)> = sqlx::query_as(
                "SELECT series_id, series_name, observation_date, value FROM macro_observations
                 WHERE series_id = ? ORDER BY observation_date DESC LIMIT 1",
            )
            .bind(series_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx("latest_macro_values"))?;

            if let Some((series_id, series_name, date, value)) = row {
                out.push(MacroObservation {
                    series_id,
                    series_name,
                    date: date.parse().unwrap_or_else(|_| NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()),
                    value,
                });
            }
        }
        Ok(out)
    }

    async fn upsert_social_signal(&self, signal: &SocialSignal) -> IntelResult<()> {
        let posts_json = serde_json::to_string(&signal.top_posts).unwrap_or_default();
        sqlx::query(
            "INSERT INTO social_signals (ticker, platform, signal_date, mention_count, avg_sentiment, top_posts)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT (ticker, platform, signal_date)
             DO UPDATE SET mention_count = excluded.mention_count, avg_sentiment = excluded.avg_sentiment, top_posts = excluded.top_posts",
        )
        .bind(&signal.ticker)
        .bind(&signal.platform)
        .bind(signal.signal_date.to_string())
        .bind(signal.mention_count)
        .bind(signal.avg_sentiment)
        .bind(&posts_json)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx("upsert_social_signal"))?;
        self.append_audit_event(
            "social_signal_upsert",
            "social_signal",
            &signal.ticker,
            &format!("platform={} date={}", signal.platform, signal.signal_date),
        )
        .await?;
        Ok(())
    }

    async fn get_social_signals(&self, ticker: &str, days: i64) -> IntelResult<Vec<SocialSignal>> {
        let cutoff = (Utc::now() - chrono::Duration::days(days)).date_naive().to_string();
        let rows = sqlx::query(
            "SELECT * FROM social_signals WHERE ticker = ? AND signal_date >= ? ORDER BY signal_date DESC",
        )
        .bind(ticker)
        .bind(&cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx("get_social_signals"))?;

        rows.iter()
            .map(|r| {
                let posts_json: String = r.try_get("top_posts").map_err(map_sqlx("row top_posts"))?;
                Ok(SocialSignal {
                    ticker: r.try_get("ticker").map_err(map_sqlx("row ticker"))?,
                    platform: r.try_get("platform").map_err(map_sqlx("row platform"))?,
                    signal_date: r
                        .try_get::<String, _>("signal_date")
                        .map_err(map_sqlx("row signal_date"))?
                        .parse()
                        .unwrap_or_else(|_| NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()),
                    mention_count: r
                        .try_get("mention_count")
                        .map_err(map_sqlx("row mention_count"))?,
                    avg_sentiment: r
                        .try_get("avg_sentiment")
                        .map_err(map_sqlx("row avg_sentiment"))?,
                    top_posts: serde_json::from_str(&posts_json).unwrap_or_default(),
                })
            })
            .collect()
    }

    async fn upsert_filing(&self, filing: &EntityFiling) -> IntelResult<()> {
        sqlx::query(
            "INSERT INTO entity_filings (accession_number, ticker, cik, filing_type, filing_date, filing_url, description)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (accession_number) DO NOTHING",
        )
        .bind(&filing.accession_number)
        .bind(&filing.ticker)
        .bind(&filing.cik)
        .bind(&filing.filing_type)
        .bind(filing.filing_date.to_string())
        .bind(&filing.filing_url)
        .bind(&filing.description)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx("upsert_filing"))?;
        self.append_audit_event(
            "filing_upsert",
            "filing",
            &filing.accession_number,
            &format!("ticker={} filing_type={}", filing.ticker, filing.filing_type),
        )
        .await?;
        Ok(())
    }

    async fn get_filings(
        &self,
        ticker: &str,
        filing_type: Option<&str>,
        limit: i64,
    ) -> IntelResult<Vec<EntityFiling>> {
        let rows = if let Some(ft) = filing_type {
            sqlx::query(
                "SELECT * FROM entity_filings WHERE ticker = ? AND filing_type = ? ORDER BY filing_date DESC LIMIT ?",
            )
            .bind(ticker)
            .bind(ft)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query(
                "SELECT * FROM entity_filings WHERE ticker = ? ORDER BY filing_date DESC LIMIT ?",
            )
            .bind(ticker)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(map_sqlx("get_filings"))?;

        rows.iter()
            .map(|r| {
                Ok(EntityFiling {
                    ticker: r.try_get("ticker").map_err(map_sqlx("row ticker"))?,
                    cik: r.try_get("cik").ok(),
                    accession_number: r
                        .try_get("accession_number")
                        .map_err(map_sqlx("row accession_number"))?,
                    filing_type: r.try_get("filing_type").map_err(map_sqlx("row filing_type"))?,
                    filing_date: r
                        .try_get::<String, _>("filing_date")
                        .map_err(map_sqlx("row filing_date"))?
                        .parse()
                        .unwrap_or_else(|_| NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()),
                    filing_url: r.try_get("filing_url").map_err(map_sqlx("row filing_url"))?,
                    description: r.try_get("description").ok(),
                })
            })
            .collect()
    }

    async fn update_coverage(&self, entity_id: i64, ticker: &str) -> IntelResult<EntityCoverage> {
        let financials_quarters: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM financial_periods WHERE ticker = ? AND period_type = 'quarterly'",
        )
        .bind(ticker)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx("update_coverage financials"))?;

        let filings_count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM entity_filings WHERE ticker = ?",
        )
        .bind(ticker)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx("update_coverage filings"))?;

        let has_macro: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM macro_observations")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx("update_coverage macro"))?;

        let has_social: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM social_signals WHERE ticker = ?",
        )
        .bind(ticker)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx("update_coverage social"))?;

        let news_pattern = format!("%{ticker}%");
        let has_news: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sources WHERE url LIKE '%news%' AND name LIKE ?",
        )
        .bind(&news_pattern)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx("update_coverage news"))?;

        let has_price: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM financial_periods WHERE ticker = ? AND key_metrics != '{}'",
        )
        .bind(ticker)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx("update_coverage price"))?;

        let financials_q = financials_quarters.0.min(8);
        let filings_c = filings_count.0.min(5);
        let score = 0.25 * (financials_q as f64 / 8.0)
            + 0.15 * (filings_c as f64 / 5.0)
            + 0.10 * if has_macro.0 > 0 { 1.0 } else { 0.0 }
            + 0.10 * if has_social.0 > 0 { 1.0 } else { 0.0 }
            + 0.20 * if has_news.0 > 0 { 1.0 } else { 0.0 }
            + 0.20 * if has_price.0 > 0 { 1.0 } else { 0.0 };

        let coverage = EntityCoverage {
            ticker: ticker.to_string(),
            has_financials: financials_quarters.0 > 0,
            financials_quarters: financials_quarters.0 as i32,
            has_filings: filings_count.0 > 0,
            filings_count: filings_count.0 as i32,
            has_macro: has_macro.0 > 0,
            has_social: has_social.0 > 0,
            has_news: has_news.0 > 0,
            has_price: has_price.0 > 0,
            coverage_score: score,
            last_updated: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO entity_coverage
                (ticker, entity_id, has_financials, financials_quarters, has_filings, filings_count, has_macro, has_social, has_news, has_price, coverage_score, last_updated)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (ticker) DO UPDATE SET
                entity_id = excluded.entity_id, has_financials = excluded.has_financials, financials_quarters = excluded.financials_quarters,
                has_filings = excluded.has_filings, filings_count = excluded.filings_count, has_macro = excluded.has_macro,
                has_social = excluded.has_social, has_news = excluded.has_news, has_price = excluded.has_price,
                coverage_score = excluded.coverage_score, last_updated = excluded.last_updated",
        )
        .bind(ticker)
        .bind(entity_id)
        .bind(coverage.has_financials)
        .bind(coverage.financials_quarters)
        .bind(coverage.has_filings)
        .bind(coverage.filings_count)
        .bind(coverage.has_macro)
        .bind(coverage.has_social)
        .bind(coverage.has_news)
        .bind(coverage.has_price)
        .bind(coverage.coverage_score)
        .bind(coverage.last_updated.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx("update_coverage write"))?;

        self.append_audit_event(
            "coverage_update",
            "entity",
            &entity_id.to_string(),
            &format!("ticker={} score={:.2}", ticker, coverage.coverage_score),
        )
        .await?;

        Ok(coverage)
    }

    async fn get_coverage(&self, ticker: &str) -> IntelResult<Option<EntityCoverage>> {
        let row: Option<sqlx::any::AnyRow> =
            sqlx::query("SELECT * FROM entity_coverage WHERE ticker = ?")
                .bind(ticker)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx("get_coverage"))?;

        row.map(|r| {
            Ok(EntityCoverage {
                ticker: r.try_get("ticker").map_err(map_sqlx("row ticker"))?,
                has_financials: r
                    .try_get("has_financials")
                    .map_err(map_sqlx("row has_financials"))?,
                financials_quarters: r
                    .try_get("financials_quarters")
                    .map_err(map_sqlx("row financials_quarters"))?,
                has_filings: r.try_get("has_filings").map_err(map_sqlx("row has_filings"))?,
                filings_count: r
                    .try_get("filings_count")
                    .map_err(map_sqlx("row filings_count"))?,
                has_macro: r.try_get("has_macro").map_err(map_sqlx("row has_macro"))?,
                has_social: r.try_get("has_social").map_err(map_sqlx("row has_social"))?,
                has_news: r.try_get("has_news").map_err(map_sqlx("row has_news"))?,
                has_price: r.try_get("has_price").map_err(map_sqlx("row has_price"))?,
                coverage_score: r
                    .try_get("coverage_score")
                    .map_err(map_sqlx("row coverage_score"))?,
                last_updated: r
                    .try_get::<String, _>("last_updated")
                    .map_err(map_sqlx("row last_updated"))?
                    .parse()
                    .unwrap_or_else(|_| Utc::now()),
            })
        })
        .transpose()
    }

    async fn save_search_result(
        &self,
        query: &SearchQuery,
        evidence: &[SearchEvidence],
    ) -> IntelResult<i64> {
        let row: (i64,) = sqlx::query_as(
            "INSERT INTO search_queries (query_text, ticker, answer, confidence, risk_level, recommendation, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(&query.query_text)
        .bind(&query.ticker)
        .bind(&query.answer)
        .bind(query.confidence)
        .bind(&query.risk_level)
        .bind(&query.recommendation)
        .bind(query.created_at.to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx("save_search_result insert"))?;

        for item in evidence {
            sqlx::query(
                "INSERT INTO search_evidence (search_id, source_name, evidence_ref, confidence, rank_score)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(row.0)
            .bind(&item.source_name)
            .bind(&item.evidence_ref)
            .bind(item.confidence)
            .bind(item.rank_score)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx("save_search_result evidence"))?;
        }

        self.append_audit_event("search_result_save", "search_query", &row.0.to_string(), &query.query_text)
            .await?;

        Ok(row.0)
    }

    async fn recent_search_results(&self, page: i64, page_size: i64) -> IntelResult<Vec<SearchQuery>> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, 100);
        let offset = (page - 1) * page_size;

        let rows = sqlx::query(
            "SELECT id, query_text, ticker, answer, confidence, risk_level, recommendation, created_at
             FROM search_queries ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(page_size)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx("recent_search_results"))?;

        rows.iter()
            .map(|r| {
                Ok(SearchQuery {
                    id: r.try_get::<i64, _>("id").ok(),
                    query_text: r.try_get("query_text").map_err(map_sqlx("row query_text"))?,
                    ticker: r.try_get("ticker").ok(),
                    answer: r.try_get("answer").map_err(map_sqlx("row answer"))?,
                    confidence: r.try_get("confidence").map_err(map_sqlx("row confidence"))?,
                    risk_level: r.try_get("risk_level").map_err(map_sqlx("row risk_level"))?,
                    recommendation: r.try_get("recommendation").map_err(map_sqlx("row recommendation"))?,
                    created_at: r
                        .try_get::<String, _>("created_at")
                        .map_err(map_sqlx("row created_at"))?
                        .parse()
                        .unwrap_or_else(|_| Utc::now()),
                })
            })
            .collect()
    }

    async fn log_ingest_run(&self, source_id: i64, status: &str, detail: &str) -> IntelResult<()> {
        sqlx::query(
            "INSERT INTO ingest_runs (source_id, status, detail, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(source_id)
        .bind(status)
        .bind(detail)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx("log_ingest_run"))?;
        Ok(())
    }

    async fn log_failed_ingestion(
        &self,
        source_id: i64,
        error: &str,
        retryable: bool,
    ) -> IntelResult<()> {
        sqlx::query(
            "INSERT INTO failed_ingestions (source_id, error, retryable, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(source_id)
        .bind(error)
        .bind(retryable)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx("log_failed_ingestion"))?;
        Ok(())
    }

    async fn run_retention_purge(
        &self,
        insights_days: u32,
        snapshots_days: u32,
        search_days: u32,
        audit_days: u32,
    ) -> IntelResult<RetentionSummary> {
        let cutoff = |days: u32| (Utc::now() - chrono::Duration::days(days as i64)).to_rfc3339();

        let insights_deleted =
            sqlx::query("DELETE FROM insights WHERE created_at < ? AND critic_status != 'flagged'")
                .bind(cutoff(insights_days))
                .execute(&self.pool)
                .await
                .map_err(map_sqlx("run_retention_purge insights"))?
                .rows_affected() as i64;

        let snapshots_deleted = sqlx::query("DELETE FROM source_snapshots WHERE observed_at < ?")
            .bind(cutoff(snapshots_days))
            .execute(&self.pool)
            .await
            .map_err(map_sqlx("run_retention_purge snapshots"))?
            .rows_affected() as i64;

        let search_deleted = sqlx::query("DELETE FROM search_queries WHERE created_at < ?")
            .bind(cutoff(search_days))
            .execute(&self.pool)
            .await
            .map_err(map_sqlx("run_retention_purge search"))?
            .rows_affected() as i64;

        let audit_deleted = sqlx::query("DELETE FROM audit_log WHERE created_at < ?")
            .bind(cutoff(audit_days))
            .execute(&self.pool)
            .await
            .map_err(map_sqlx("run_retention_purge audit"))?
            .rows_affected() as i64;

        self.append_audit_event(
            "retention_purge",
            "system",
            "retention",
            &format!(
                "insights={insights_deleted} snapshots={snapshots_deleted} search={search_deleted} audit={audit_deleted}"
            ),
        )
        .await?;

        Ok(RetentionSummary {
            insights_deleted,
            snapshots_deleted,
            search_deleted,
            audit_deleted,
        })
    }

    async fn delete_source_records(&self, source_id: i64) -> IntelResult<DeletionSummary> {
        let snapshots_deleted = sqlx::query("DELETE FROM source_snapshots WHERE source_id = ?")
            .bind(source_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx("delete_source_records snapshots"))?
            .rows_affected() as i64;

        let insights_deleted = sqlx::query("DELETE FROM insights WHERE source_id = ?")
            .bind(source_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx("delete_source_records insights"))?
            .rows_affected() as i64;

        let memory_chunks_deleted = sqlx::query("DELETE FROM memory_chunks WHERE source_id = ?")
            .bind(source_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx("delete_source_records memory_chunks"))?
            .rows_affected() as i64;

        let evidence_relations_deleted =
            sqlx::query("DELETE FROM source_evidence_relations WHERE source_id = ?")
                .bind(source_id)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx("delete_source_records evidence_relations"))?
                .rows_affected() as i64;

        self.append_audit_event(
            "source_delete",
            "source",
            &source_id.to_string(),
            &format!(
                "snapshots={snapshots_deleted} insights={insights_deleted} memory_chunks={memory_chunks_deleted} evidence_relations={evidence_relations_deleted}"
            ),
        )
        .await?;

        Ok(DeletionSummary {
            snapshots_deleted,
            insights_deleted,
            memory_chunks_deleted,
            evidence_relations_deleted,
        })
    }

    async fn append_audit_event(
        &self,
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        detail: &str,
    ) -> IntelResult<()> {
        audit::log_audit(&self.pool, event_type, entity_type, entity_id, detail).await
    }

    async fn verify_audit_chain(&self) -> IntelResult<AuditChainVerification> {
        audit::verify_audit_chain(&self.pool).await
    }
}

fn row_to_financial_period(row: &sqlx::any::AnyRow) -> Result<FinancialPeriod, sqlx::Error> {
    let period_type_raw: String = row.try_get("period_type")?;
    let period_end: String = row.try_get("period_end")?;
    let income_json: String = row.try_get("income")?;
    let balance_json: String = row.try_get("balance")?;
    let cash_flow_json: String = row.try_get("cash_flow")?;
    let key_metrics_json: String = row.try_get("key_metrics")?;

    Ok(FinancialPeriod {
        id: row.try_get("id").ok(),
        entity_id: row.try_get("entity_id").ok(),
        ticker: row.try_get("ticker")?,
        period_type: parse_period_type(&period_type_raw),
        period_end: period_end
            .parse()
            .unwrap_or_else(|_| NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()),
        fiscal_year: row.try_get("fiscal_year")?,
        fiscal_quarter: row.try_get("fiscal_quarter").ok(),
        source_provider: row.try_get("source_provider")?,
        income: serde_json::from_str::<IncomeStatement>(&income_json).unwrap_or_default(),
        balance: serde_json::from_str::<BalanceSheet>(&balance_json).unwrap_or_default(),
        cash_flow: serde_json::from_str::<CashFlowStatement>(&cash_flow_json).unwrap_or_default(),
        key_metrics: serde_json::from_str::<KeyMetrics>(&key_metrics_json).unwrap_or_default(),
    })
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        (dot / (norm_a * norm_b)) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intel_core::ConnectorType;

    async fn test_pool() -> AnyPool {
        sqlx::any::install_default_drivers();
        let pool = AnyPool::connect("sqlite::memory:").await.unwrap();
        schema::ensure_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn upserts_and_looks_up_entity_by_ticker() {
        let repo = SqlRepository::from_pool(test_pool().await);
        let entity = repo
            .upsert_entity(EntityUpsert {
                name: "Nvidia Corp".into(),
                ticker: "NVDA".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(entity.ticker, "NVDA");

        let found = repo
            .lookup_entity(LookupKey::Ticker("nvda"))
            .await
            .unwrap()
            .expect("entity should be found");
        assert_eq!(found.name, "Nvidia Corp");
        assert!(found.aliases.contains("nvda"));
    }

    #[tokio::test]
    async fn second_upsert_merges_sector_without_clobbering() {
        let repo = SqlRepository::from_pool(test_pool().await);
        repo.upsert_entity(EntityUpsert {
            name: "Nvidia Corp".into(),
            ticker: "NVDA".into(),
            sector: Some("Technology".into()),
            ..Default::default()
        })
        .await
        .unwrap();

        let updated = repo
            .upsert_entity(EntityUpsert {
                name: "Nvidia Corp".into(),
                ticker: "NVDA".into(),
                industry: Some("Semiconductors".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(updated.sector.as_deref(), Some("Technology"));
        assert_eq!(updated.industry.as_deref(), Some("Semiconductors"));
    }

    #[tokio::test]
    async fn financial_period_upsert_deep_merges_across_providers() {
        let repo = SqlRepository::from_pool(test_pool().await);
        let period_end = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();

        let mut first = FinancialPeriod {
            id: None,
            entity_id: None,
            ticker: "NVDA".into(),
            period_type: PeriodType::Annual,
            period_end,
            fiscal_year: 2024,
            fiscal_quarter: None,
            source_provider: "fmp".into(),
            income: IncomeStatement::default(),
            balance: BalanceSheet::default(),
            cash_flow: CashFlowStatement::default(),
            key_metrics: KeyMetrics::default(),
        };
        first.income.revenue = Some(100.0);
        repo.upsert_financial_period(&first).await.unwrap();

        let mut second = first.clone();
        second.income.revenue = None;
        second.income.net_income = Some(20.0);
        let merged = repo.upsert_financial_period(&second).await.unwrap();

        assert_eq!(merged.income.revenue, Some(100.0));
        assert_eq!(merged.income.net_income, Some(20.0));
    }

    #[tokio::test]
    async fn audit_chain_verifies_after_several_events() {
        let repo = SqlRepository::from_pool(test_pool().await);
        for i in 0..3 {
            repo.append_audit_event("ingest", "source", &i.to_string(), "ok")
                .await
                .unwrap();
        }
        let verification = repo.verify_audit_chain().await.unwrap();
        assert!(verification.is_valid);
        assert_eq!(verification.total_entries, 3);
    }

    #[tokio::test]
    async fn add_source_is_idempotent_on_url() {
        let repo = SqlRepository::from_pool(test_pool().await);
        let a = repo
            .add_source("NVDA news", "https://example.com/nvda", ConnectorType::Web)
            .await
            .unwrap();
        let b = repo
            .add_source("NVDA news v2", "https://example.com/nvda", ConnectorType::Web)
            .await
            .unwrap();
        assert_eq!(a.id, b.id);
    }
}
