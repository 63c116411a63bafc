use std::sync::Arc;
use std::time::Duration;

use intel_core::{
    Citation, DecisionCard, EmbeddingClient, Entity, IntelResult, KnowledgeStatus, ProviderResult,
    QueryContext, RankedEvidenceItem, Report, ReportSections, SearchEvidence, SearchQuery, Settings,
    StageEvent, ThreatLevel,
};
use intel_entity_resolver::EntityResolver;
use intel_enrichment::{
    build_coverage_assessment, build_filings_summary, build_financial_performance,
    build_historical_trends, build_macro_context, build_social_sentiment, resolve_scenarios,
    FmpBackfillProvider,
};
use intel_generation::{
    generate_competitive_landscape_tokens, generate_executive_summary_tokens, generate_market_narrative_tokens,
    generate_parallel_intelligence, GenerationClient,
};
use intel_ingestion::IngestJob;
use intel_providers::dispatch::{run_full_enrichment, ProviderRegistry};
use intel_providers::{discover_query_sources, fetch_financial_snapshot, fetch_price_history, FinancialSnapshot, FmpProvider};
use intel_ranking::{build_signal_shifts, detect_contradictions, needs_refresh, rank_evidence, tokenize, RankingContext};
use intel_repository::Repository;
use intel_retrieval::hybrid_retrieve;
use reqwest::Client;
use tokio::sync::mpsc;

use crate::query::parse_query;

const TOP_EVIDENCE_SAMPLE: usize = 5;
const RELATED_ENTITIES_LIMIT: i64 = 5;

/// Top-level coroutine-equivalent composing C2–C9 into a single query
/// answer, grounded on `core/pipeline/intelligence.py::run_market_intelligence_query`.
pub struct Orchestrator {
    repo: Arc<dyn Repository>,
    settings: Arc<Settings>,
    embedding_client: EmbeddingClient,
    generation_client: GenerationClient,
    resolver: EntityResolver,
    provider_registry: ProviderRegistry,
    fmp: Arc<FmpProvider>,
    backfill: FmpBackfillProvider,
    http_client: Client,
    job_sender: Option<mpsc::Sender<IngestJob>>,
}

impl Orchestrator {
    /// The orchestrator keeps its own `FmpProvider` handle separate from the
    /// one `ProviderRegistry` builds internally, since historical-trend
    /// backfill and snapshot gap-fill run outside the registry's
    /// per-provider rate limiting (`intel_providers::dispatch` documents the
    /// split).
    pub fn new(repo: Arc<dyn Repository>, settings: Arc<Settings>) -> Self {
        let embedding_client = EmbeddingClient::new(&settings);
        let generation_client = GenerationClient::new((*settings).clone());
        let resolver = EntityResolver::new(repo.clone(), settings.clone());
        let provider_registry = ProviderRegistry::build(&settings, repo.clone());
        let fmp = Arc::new(FmpProvider::new(settings.fmp_api_key.clone(), repo.clone()));
        let backfill = FmpBackfillProvider::new(repo.clone(), fmp.clone());
        let http_client = Client::builder().timeout(Duration::from_secs(10)).build().unwrap_or_else(|_| Client::new());

        Self {
            repo,
            settings,
            embedding_client,
            generation_client,
            resolver,
            provider_registry,
            fmp,
            backfill,
            http_client,
            job_sender: None,
        }
    }

    /// Attaches the worker pool's job queue so queries can enqueue
    /// priority ingestion for newly-discovered sources. Without one,
    /// `run`/`run_with_progress` still work, the enqueue just never happens.
    pub fn with_job_sender(mut self, job_sender: mpsc::Sender<IngestJob>) -> Self {
        self.job_sender = Some(job_sender);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Best-effort: discover RSS/web sources for the resolved entity and
    /// push priority ingestion jobs for them onto the worker queue.
    /// Failures (discovery error, full queue, no worker attached) are
    /// swallowed; this never blocks or fails the query.
    async fn enqueue_priority_ingestion(&self, entity: &Entity) -> Option<String> {
        let sender = self.job_sender.as_ref()?;
        let sources = discover_query_sources(&*self.repo, &entity.ticker, &entity.name).await.ok()?;
        if sources.is_empty() {
            return None;
        }
        let mut enqueued = Vec::with_capacity(sources.len());
        for source in &sources {
            if sender.try_send(IngestJob::priority(source.id)).is_ok() {
                enqueued.push(source.id.to_string());
            }
        }
        if enqueued.is_empty() {
            None
        } else {
            Some(enqueued.join(","))
        }
    }

    /// Best-effort refresh trigger: looks at a small sample of existing
    /// insights for the query and, if thin or stale, runs the full
    /// multi-provider enrichment dispatch before retrieval. Returns the
    /// flattened summary alongside the per-provider results so the caller
    /// can emit one `provider_complete` event per provider.
    async fn maybe_refresh(&self, query_text: &str, entity: &Option<Entity>) -> IntelResult<Option<(serde_json::Value, Vec<ProviderResult>)>> {
        let sample = self.repo.search_insights_by_text(query_text, 5).await?;
        let sample_items: Vec<RankedEvidenceItem> = sample
            .into_iter()
            .map(|(insight, text_rank)| RankedEvidenceItem {
                source_name: insight.source_name,
                source_url: insight.source_url,
                text: insight.text,
                recommendation: insight.recommendation,
                threat_level: insight.threat_level,
                confidence: insight.confidence,
                evidence_ref: insight.evidence_ref,
                critic_status: insight.critic_status,
                created_at: insight.created_at,
                text_rank,
                semantic_score: None,
                entity_relevance: 0.0,
                rank_score: 0.0,
            })
            .collect();

        if !needs_refresh(&sample_items) {
            return Ok(None);
        }

        let Some(entity) = entity else {
            return Ok(None);
        };

        let summary = run_full_enrichment(&*self.repo, &self.provider_registry, entity).await?;
        let flattened = serde_json::json!({
            "providers_run": summary.providers_run,
            "total_records": summary.total_records,
            "rss_sources_discovered": summary.rss_sources_discovered,
            "coverage_score": summary.coverage.coverage_score,
        });
        Ok(Some((flattened, summary.providers_run)))
    }

    async fn build_related_entities(&self, query_context: &QueryContext, query_text: &str) -> Vec<String> {
        let entity_name = query_context.entity.clone().unwrap_or_else(|| query_text.to_string());
        match self.repo.graph_related_sources(&entity_name, RELATED_ENTITIES_LIMIT).await {
            Ok(related) => related
                .into_iter()
                .take(5)
                .map(|r| format!("{} ({})", r.evidence_ref, r.threat_level.as_str()))
                .collect(),
            Err(error) => {
                tracing::warn!(%error, "graph related-entity lookup failed");
                Vec::new()
            }
        }
    }

    fn risk_level_from_top(items: &[RankedEvidenceItem]) -> &'static str {
        let max_threat = items.iter().take(TOP_EVIDENCE_SAMPLE).map(|i| i.threat_level).max();
        match max_threat {
            Some(ThreatLevel::High) => "high",
            Some(ThreatLevel::Medium) => "medium",
            _ => "low",
        }
    }

    fn avg_confidence(items: &[RankedEvidenceItem]) -> f64 {
        let sample = &items[..items.len().min(TOP_EVIDENCE_SAMPLE)];
        if sample.is_empty() {
            return 0.0;
        }
        let sum: f64 = sample.iter().map(|i| i.confidence).sum();
        (sum / sample.len() as f64 * 1000.0).round() / 1000.0
    }

    fn template_executive_summary(query_text: &str, financials: &FinancialSnapshot, top: &[RankedEvidenceItem]) -> String {
        let mut parts = vec![format!("Analysis for '{query_text}': ")];
        if let Some(price) = financials.price {
            parts.push(format!("Current price ${price}"));
        }
        if let Some(pe) = financials.trailing_pe {
            parts.push(format!("P/E {pe:.2}."));
        }
        if let Some(growth) = financials.revenue_growth {
            parts.push(format!("Revenue growth {:.1}%.", growth * 100.0));
        }
        parts.push(format!(
            "Based on {} evidence sources, overall risk is {}.",
            top.len(),
            top.first().map(|t| t.threat_level.as_str()).unwrap_or("low")
        ));
        if let Some(top_item) = top.first() {
            let snippet: String = top_item.text.chars().take(150).collect();
            parts.push(format!("Top signal: {snippet}"));
        }
        parts.join(" ")
    }

    fn template_recommendation(risk_level: &str, confidence: f64, has_contradictions: bool, top_len: usize) -> String {
        let prefix = match risk_level {
            "high" => "Exercise caution — ",
            "medium" => "Monitor closely — ",
            _ => "",
        };
        let contradiction_note = if has_contradictions {
            "Contradictory signals detected; verify before acting."
        } else {
            "Review supporting evidence before making decisions."
        };
        format!(
            "{prefix}Evidence confidence is {:.0}% across {} sources. {contradiction_note}",
            confidence * 100.0,
            top_len.min(TOP_EVIDENCE_SAMPLE)
        )
    }

    fn template_narrative(query_context: &QueryContext, top: &[RankedEvidenceItem]) -> String {
        let mut parts = Vec::new();
        let top_sources: Vec<&str> = top.iter().take(3).map(|i| i.source_name.as_str()).collect();
        if top_sources.is_empty() {
            parts.push("Limited source diversity in current evidence.".to_string());
        } else {
            parts.push(format!("Signals cluster around {}.", top_sources.join(", ")));
        }
        parts.push(format!(
            "Query intent is interpreted as {:?} within {:?} horizon.",
            query_context.intent, query_context.timeframe
        ));
        if !top.is_empty() {
            parts.push("Current intelligence indicates active movement that warrants monitored execution.".to_string());
        } else {
            parts.push("Evidence is thin; run broader coverage and revisit before material decisions.".to_string());
        }
        parts.join(" ")
    }

    /// Runs the full batch pipeline for `query_text`, returning the
    /// assembled report. See §4.8.1.
    pub async fn run(&self, query_text: &str, limit: i64) -> IntelResult<Report> {
        self.run_with_progress(query_text, limit, None).await
    }

    async fn emit(progress: Option<&mpsc::Sender<StageEvent>>, event: StageEvent) {
        if let Some(tx) = progress {
            let _ = tx.send(event).await;
        }
    }

    /// Drives the same pipeline as [`Self::run`], optionally reporting a
    /// `StageEvent` at each named checkpoint so [`crate::stream::run_stream`]
    /// can relay progress over SSE/websocket while the query is still in
    /// flight.
    pub(crate) async fn run_with_progress(
        &self,
        query_text: &str,
        limit: i64,
        progress: Option<&mpsc::Sender<StageEvent>>,
    ) -> IntelResult<Report> {
        let (query_context, _tokens, entity) = parse_query(&self.resolver, query_text).await;
        let ticker = query_context.ticker.clone();
        Self::emit(progress, StageEvent::new("query_parsed", 0.05).with_data(serde_json::json!({ "entity": query_context.entity }))).await;

        let background_priority_task_id = match &entity {
            Some(entity) => self.enqueue_priority_ingestion(entity).await,
            None => None,
        };

        Self::emit(progress, StageEvent::new("enrichment_started", 0.08)).await;
        let refresh_outcome = self.maybe_refresh(query_text, &entity).await.unwrap_or_else(|error| {
            tracing::warn!(%error, "refresh check failed");
            None
        });
        let (enrichment, providers_run) = match refresh_outcome {
            Some((summary, providers_run)) => (Some(summary), providers_run),
            None => (None, Vec::new()),
        };
        for result in &providers_run {
            Self::emit(progress, StageEvent::new("provider_complete", 0.12).with_data(serde_json::to_value(result).unwrap_or_default())).await;
        }
        Self::emit(progress, StageEvent::new("enrichment_complete", 0.20).with_data(enrichment.clone().unwrap_or(serde_json::json!({ "triggered": false })))).await;

        Self::emit(progress, StageEvent::new("retrieval_started", 0.22)).await;
        let retrieval = hybrid_retrieve(&*self.repo, &self.embedding_client, query_text, &query_context, limit.max(12)).await?;
        Self::emit(progress, StageEvent::new("retrieval_complete", 0.30).with_data(serde_json::json!({ "semantic_matches": retrieval.semantic_matches }))).await;

        let ranking_tokens = tokenize(query_text);
        let ranking_ctx = RankingContext::from_query(&query_context, &ranking_tokens, entity.as_ref().and_then(|e| e.sector.as_deref()));
        let ranked = rank_evidence(retrieval.candidates, &ranking_ctx);
        let top_evidence: Vec<RankedEvidenceItem> = ranked.into_iter().take(limit.max(1) as usize).collect();
        Self::emit(progress, StageEvent::new("ranking_complete", 0.35).with_data(serde_json::json!({ "ranked": top_evidence.len() }))).await;

        let financials = match &ticker {
            Some(ticker) => fetch_financial_snapshot(&self.http_client, Some(&self.fmp), ticker).await,
            None => FinancialSnapshot::default(),
        };
        Self::emit(progress, StageEvent::new("financial_snapshot", 0.42)).await;

        let (historical_view, historical_json) = build_historical_trends(&*self.repo, &self.backfill, ticker.as_deref()).await?;
        Self::emit(progress, StageEvent::new("historical_trends", 0.50)).await;

        let (macro_view, macro_json) = build_macro_context(&*self.repo).await?;
        Self::emit(progress, StageEvent::new("macro_context", 0.56)).await;

        let (sentiment_view, sentiment_json) = build_social_sentiment(&*self.repo, ticker.as_deref()).await?;
        Self::emit(progress, StageEvent::new("social_sentiment", 0.62)).await;

        let coverage_json = match &ticker {
            Some(ticker) => build_coverage_assessment(&*self.repo, ticker, &financials, &sentiment_view).await?,
            None => serde_json::json!({ "available": false }),
        };
        let coverage_score = coverage_json.get("coverage_score").and_then(|v| v.as_f64()).unwrap_or(0.0);
        Self::emit(progress, StageEvent::new("coverage", 0.65)).await;

        let filings_json = build_filings_summary(&*self.repo, ticker.as_deref()).await?;
        Self::emit(progress, StageEvent::new("filings", 0.70)).await;

        let contradictions = detect_contradictions(&top_evidence);
        Self::emit(progress, StageEvent::new("analyzing", 0.72)).await;

        // Token-streamed replays of the upcoming parallel-intelligence calls, only
        // run when a progress channel is attached. Each prompt matches what
        // `generate_parallel_intelligence` builds for the same field, so the shared
        // response cache absorbs the real LLM call and nothing is fetched twice.
        if progress.is_some() {
            if let Some(tokens) =
                generate_executive_summary_tokens(&self.generation_client, query_text, &top_evidence, &financials, &macro_view, &sentiment_view, &historical_view).await
            {
                for token in tokens {
                    Self::emit(progress, StageEvent::new("decision_token", 0.74).with_message(token)).await;
                }
            }
        }

        let parallel = generate_parallel_intelligence(
            &self.generation_client,
            query_text,
            ticker.as_deref(),
            &top_evidence,
            &financials,
            &historical_view,
            &macro_view,
            &sentiment_view,
            &contradictions,
            coverage_score,
        )
        .await;
        Self::emit(progress, StageEvent::new("decision_ready", 0.78)).await;

        let confidence = Self::avg_confidence(&top_evidence);
        let risk_level = Self::risk_level_from_top(&top_evidence);

        let (answer_summary, recommendation) = if top_evidence.is_empty() {
            (
                "No strong evidence found for this query in current ingested intelligence.".to_string(),
                "Ingest additional relevant sources or broaden query terms before making a decision.".to_string(),
            )
        } else {
            let summary = parallel
                .executive_summary
                .clone()
                .unwrap_or_else(|| Self::template_executive_summary(query_text, &financials, &top_evidence));
            let recommendation = parallel.recommendation.clone().unwrap_or_else(|| {
                Self::template_recommendation(risk_level, confidence, !contradictions.is_empty(), top_evidence.len())
            });
            (summary, recommendation)
        };

        let confidence = if top_evidence.is_empty() { 0.25 } else { confidence };
        let risk_level = if top_evidence.is_empty() { "low" } else { risk_level };

        let decision = DecisionCard { recommendation: recommendation.clone(), confidence, risk_level: risk_level.to_string() };

        Self::emit(progress, StageEvent::new("narrative_started", 0.80)).await;
        if progress.is_some() {
            if let Some(tokens) = generate_market_narrative_tokens(
                &self.generation_client,
                query_text,
                &top_evidence,
                &financials,
                &historical_view,
                &macro_view,
                &sentiment_view,
                coverage_score,
            )
            .await
            {
                for token in tokens {
                    Self::emit(progress, StageEvent::new("narrative_token", 0.82).with_message(token)).await;
                }
            }
        }
        let narrative = parallel.market_narrative.clone().unwrap_or_else(|| Self::template_narrative(&query_context, &top_evidence));
        Self::emit(progress, StageEvent::new("narrative_ready", 0.85)).await;

        let scenarios = resolve_scenarios(parallel.scenarios.clone(), &decision, &top_evidence);
        Self::emit(progress, StageEvent::new("scenarios_ready", 0.90)).await;

        Self::emit(progress, StageEvent::new("competitive_started", 0.91)).await;
        if progress.is_some() {
            if let Some(ticker) = &ticker {
                if let Some(tokens) = generate_competitive_landscape_tokens(
                    &self.generation_client,
                    query_text,
                    ticker,
                    &top_evidence,
                    &financials,
                    financials.sector.as_deref().unwrap_or(""),
                    financials.industry.as_deref().unwrap_or(""),
                )
                .await
                {
                    for token in tokens {
                        Self::emit(progress, StageEvent::new("competitive_token", 0.92).with_message(token)).await;
                    }
                }
            }
        }
        Self::emit(
            progress,
            StageEvent::new("competitive_landscape", 0.93).with_data(serde_json::json!({ "available": parallel.competitive_landscape.is_some() })),
        )
        .await;

        if progress.is_some() {
            let price_history_data = match &ticker {
                Some(ticker) => match fetch_price_history(&self.http_client, ticker, &financials).await {
                    Some(history) => serde_json::json!({
                        "available": true,
                        "current": history.current,
                        "fifty_two_week_high": history.fifty_two_week_high,
                        "fifty_two_week_low": history.fifty_two_week_low,
                        "ytd_return": history.ytd_return,
                        "one_month_return": history.one_month_return,
                        "three_month_return": history.three_month_return,
                        "range_position": history.range_position,
                    }),
                    None => serde_json::json!({ "available": false }),
                },
                None => serde_json::json!({ "available": false }),
            };
            Self::emit(progress, StageEvent::new("price_history", 0.95).with_data(price_history_data)).await;
        }

        let signal_shifts = build_signal_shifts(&top_evidence);
        let related_entities = self.build_related_entities(&query_context, query_text).await;
        let financial_performance = build_financial_performance(&financials);

        let citations: Vec<Citation> = top_evidence
            .iter()
            .take(8)
            .map(|item| Citation {
                source: item.source_name.clone(),
                evidence_ref: item.evidence_ref.clone(),
                confidence: item.confidence,
                rank_score: item.rank_score,
                semantic_score: item.semantic_score,
            })
            .collect();

        let report_sections = ReportSections {
            executive_summary: answer_summary.clone(),
            decision_card: decision.clone(),
            financial_performance,
            historical_trends: historical_json,
            trend_analysis: parallel.trend_analysis.clone().unwrap_or_default(),
            macro_context: macro_json,
            social_sentiment: sentiment_json,
            filings: filings_json,
            coverage: coverage_json,
            related_entities,
            market_narrative: narrative,
            competitive_landscape: parallel.competitive_landscape.clone(),
            why_it_matters: recommendation.clone(),
            key_signal_shifts: signal_shifts,
            scenarios,
            contradictions,
            citations,
        };

        let search_query = SearchQuery {
            id: None,
            query_text: query_text.to_string(),
            ticker: ticker.clone(),
            answer: answer_summary,
            confidence,
            risk_level: risk_level.to_string(),
            recommendation,
            created_at: chrono::Utc::now(),
        };
        let search_evidence: Vec<SearchEvidence> = top_evidence
            .iter()
            .map(|item| SearchEvidence {
                search_id: 0,
                source_name: item.source_name.clone(),
                evidence_ref: item.evidence_ref.clone(),
                confidence: item.confidence,
                rank_score: item.rank_score,
            })
            .collect();
        let search_id = self.repo.save_search_result(&search_query, &search_evidence).await?;

        let knowledge_status = KnowledgeStatus {
            evidence_count: top_evidence.len(),
            semantic_matches: retrieval.semantic_matches,
            graph_related_sources: retrieval.graph_related_sources,
            connected_entities: retrieval.connected_entities,
            enrichment_triggered: enrichment.is_some(),
            background_priority_task_id,
            enrichment,
        };

        let report = Report {
            search_id,
            generated_at: chrono::Utc::now(),
            query_context,
            report: report_sections,
            knowledge_status,
            evidence: top_evidence,
        };
        Self::emit(progress, StageEvent::new("complete", 1.0).with_data(serde_json::to_value(&report).unwrap_or_default())).await;

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intel_core::{CriticStatus, Intent, Timeframe};

    fn evidence_item(source_name: &str, threat_level: ThreatLevel, confidence: f64) -> RankedEvidenceItem {
        RankedEvidenceItem {
            source_name: source_name.to_string(),
            source_url: "https://example.com".to_string(),
            text: "Revenue beat estimates this quarter on strong cloud demand.".to_string(),
            recommendation: "hold".to_string(),
            threat_level,
            confidence,
            evidence_ref: format!("ref-{source_name}"),
            critic_status: CriticStatus::Approved,
            created_at: chrono::Utc::now(),
            text_rank: 0.5,
            semantic_score: Some(0.6),
            entity_relevance: 0.8,
            rank_score: 0.7,
        }
    }

    #[test]
    fn risk_level_tracks_highest_threat_in_top_sample() {
        let items = vec![
            evidence_item("a", ThreatLevel::Low, 0.5),
            evidence_item("b", ThreatLevel::High, 0.9),
        ];
        assert_eq!(Orchestrator::risk_level_from_top(&items), "high");
    }

    #[test]
    fn risk_level_defaults_to_low_when_empty() {
        assert_eq!(Orchestrator::risk_level_from_top(&[]), "low");
    }

    #[test]
    fn avg_confidence_averages_top_sample_only() {
        let items: Vec<RankedEvidenceItem> = (0..8).map(|i| evidence_item("s", ThreatLevel::Low, 0.1 * i as f64)).collect();
        let avg = Orchestrator::avg_confidence(&items);
        // TOP_EVIDENCE_SAMPLE=5, so only the first five (0.0..0.4) are averaged.
        assert_eq!(avg, 0.2);
    }

    #[test]
    fn avg_confidence_is_zero_for_empty_input() {
        assert_eq!(Orchestrator::avg_confidence(&[]), 0.0);
    }

    #[test]
    fn template_recommendation_flags_caution_on_high_risk() {
        let text = Orchestrator::template_recommendation("high", 0.8, false, 4);
        assert!(text.starts_with("Exercise caution"));
        assert!(text.contains("80%"));
    }

    #[test]
    fn template_recommendation_notes_contradictions_when_present() {
        let text = Orchestrator::template_recommendation("low", 0.6, true, 2);
        assert!(text.contains("Contradictory signals detected"));
    }

    #[test]
    fn template_narrative_reports_thin_evidence_when_empty() {
        let context = QueryContext { entity: Some("Acme".to_string()), ticker: None, timeframe: Timeframe::Current, intent: Intent::General };
        let narrative = Orchestrator::template_narrative(&context, &[]);
        assert!(narrative.contains("thin"));
    }

    #[test]
    fn template_narrative_clusters_around_top_sources_when_present() {
        let context = QueryContext { entity: Some("Acme".to_string()), ticker: Some("ACME".to_string()), timeframe: Timeframe::Quarter, intent: Intent::Financial };
        let items = vec![evidence_item("Reuters", ThreatLevel::Low, 0.7)];
        let narrative = Orchestrator::template_narrative(&context, &items);
        assert!(narrative.contains("Reuters"));
    }
}
