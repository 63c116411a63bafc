use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Company,
    Etf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: i64,
    pub name: String,
    pub ticker: String,
    pub cik: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub exchange: Option<String>,
    pub entity_type: EntityType,
    pub aliases: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity {
    /// Union `{query-lower, canonical-name-lower, ticker-lower}` into aliases.
    pub fn with_base_aliases(mut self) -> Self {
        self.aliases.insert(self.name.to_lowercase());
        self.aliases.insert(self.ticker.to_lowercase());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    Quarterly,
    Annual,
}

fn merge_opt<T: Clone>(prior: &Option<T>, incoming: &Option<T>) -> Option<T> {
    incoming.clone().or_else(|| prior.clone())
}

fn merge_extra(
    prior: &BTreeMap<String, f64>,
    incoming: &BTreeMap<String, f64>,
) -> BTreeMap<String, f64> {
    let mut merged = prior.clone();
    merged.extend(incoming.clone());
    merged
}

macro_rules! statement_map {
    ($name:ident { $($field:ident),* $(,)? }) => {
        #[derive(Debug, Clone, Default, Serialize, Deserialize)]
        pub struct $name {
            $(pub $field: Option<f64>,)*
            /// Provider-specific keys that have no named field here.
            #[serde(default)]
            pub extra: BTreeMap<String, f64>,
        }

        impl $name {
            pub fn is_empty(&self) -> bool {
                $(self.$field.is_none() &&)* self.extra.is_empty()
            }

            /// Field-by-field prefer-incoming-if-set merge. An empty `incoming`
            /// leaves `self` unchanged.
            pub fn deep_merge(&self, incoming: &Self) -> Self {
                Self {
                    $($field: merge_opt(&self.$field, &incoming.$field),)*
                    extra: merge_extra(&self.extra, &incoming.extra),
                }
            }
        }
    };
}

statement_map!(IncomeStatement {
    revenue,
    gross_profit,
    operating_income,
    net_income,
    eps,
    ebitda,
});

statement_map!(BalanceSheet {
    total_assets,
    total_liabilities,
    shareholders_equity,
    cash_and_equivalents,
    total_debt,
});

statement_map!(CashFlowStatement {
    operating,
    investing,
    financing,
    capital_expenditure,
});

statement_map!(KeyMetrics {
    pe_ratio,
    peg_ratio,
    debt_to_equity,
    current_ratio,
    dividend_yield,
});

/// Unique by `(ticker, period_type, period_end, source_provider)` — see
/// Open Question (c): rows from different providers for the same period
/// coexist rather than coalescing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialPeriod {
    pub id: Option<i64>,
    pub entity_id: Option<i64>,
    pub ticker: String,
    pub period_type: PeriodType,
    pub period_end: NaiveDate,
    pub fiscal_year: i32,
    pub fiscal_quarter: Option<i32>,
    pub source_provider: String,
    pub income: IncomeStatement,
    pub balance: BalanceSheet,
    pub cash_flow: CashFlowStatement,
    pub key_metrics: KeyMetrics,
}

impl FinancialPeriod {
    pub fn deep_merge(&self, incoming: &Self) -> Self {
        Self {
            id: self.id,
            entity_id: incoming.entity_id.or(self.entity_id),
            ticker: self.ticker.clone(),
            period_type: self.period_type,
            period_end: self.period_end,
            fiscal_year: self.fiscal_year,
            fiscal_quarter: incoming.fiscal_quarter.or(self.fiscal_quarter),
            source_provider: self.source_provider.clone(),
            income: self.income.deep_merge(&incoming.income),
            balance: self.balance.deep_merge(&incoming.balance),
            cash_flow: self.cash_flow.deep_merge(&incoming.cash_flow),
            key_metrics: self.key_metrics.deep_merge(&incoming.key_metrics),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroObservation {
    pub series_id: String,
    pub series_name: String,
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialPost {
    pub platform: String,
    pub title: String,
    pub url: String,
    pub sentiment: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialSignal {
    pub ticker: String,
    pub platform: String,
    pub signal_date: NaiveDate,
    pub mention_count: i32,
    pub avg_sentiment: f64,
    pub top_posts: Vec<SocialPost>,
}

impl SocialSignal {
    pub const MAX_TOP_POSTS: usize = 10;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityFiling {
    pub ticker: String,
    pub cik: Option<String>,
    pub accession_number: String,
    pub filing_type: String,
    pub filing_date: NaiveDate,
    pub filing_url: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorType {
    Web,
    Rss,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub connector_type: ConnectorType,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSnapshot {
    pub source_id: i64,
    pub content_hash: String,
    pub excerpt: String,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreatLevel {
    Low,
    Medium,
    High,
}

impl ThreatLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatLevel::Low => "low",
            ThreatLevel::Medium => "medium",
            ThreatLevel::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CriticStatus {
    Approved,
    Flagged,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insight {
    pub id: Option<i64>,
    pub source_id: i64,
    pub source_name: String,
    pub source_url: String,
    pub text: String,
    pub recommendation: String,
    pub threat_level: ThreatLevel,
    pub confidence: f64,
    pub evidence_ref: String,
    pub content_hash: String,
    pub critic_status: CriticStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryChunk {
    pub source_id: i64,
    pub source_name: String,
    pub source_url: String,
    pub content_hash: String,
    pub chunk_index: i32,
    pub chunk_text: String,
    pub evidence_ref: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceEvidenceRelation {
    pub source_id: i64,
    pub evidence_ref: String,
    pub threat_level: ThreatLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityCoverage {
    pub ticker: String,
    pub has_financials: bool,
    pub financials_quarters: i32,
    pub has_filings: bool,
    pub filings_count: i32,
    pub has_macro: bool,
    pub has_social: bool,
    pub has_news: bool,
    pub has_price: bool,
    pub coverage_score: f64,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub id: Option<i64>,
    pub query_text: String,
    pub ticker: Option<String>,
    pub answer: String,
    pub confidence: f64,
    pub risk_level: String,
    pub recommendation: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchEvidence {
    pub search_id: i64,
    pub source_name: String,
    pub evidence_ref: String,
    pub confidence: f64,
    pub rank_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub sequence_number: i64,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub detail: String,
    pub prev_hash: String,
    pub entry_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResult {
    pub provider: String,
    pub data_type: String,
    pub records_stored: i64,
    pub success: bool,
    pub error: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    Current,
    Quarter,
    Year,
    Recent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    General,
    Risk,
    Financial,
    Market,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryContext {
    pub entity: Option<String>,
    pub ticker: Option<String>,
    pub timeframe: Timeframe,
    pub intent: Intent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionCard {
    pub recommendation: String,
    pub confidence: f64,
    pub risk_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub probability: f64,
    pub assumption: String,
    pub impact: String,
    pub trigger_signals: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contradiction {
    pub kind: String,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub source: String,
    pub evidence_ref: String,
    pub confidence: f64,
    pub rank_score: f64,
    pub semantic_score: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSections {
    pub executive_summary: String,
    pub decision_card: DecisionCard,
    pub financial_performance: serde_json::Value,
    pub historical_trends: serde_json::Value,
    pub trend_analysis: String,
    pub macro_context: serde_json::Value,
    pub social_sentiment: serde_json::Value,
    pub filings: serde_json::Value,
    pub coverage: serde_json::Value,
    pub related_entities: Vec<String>,
    pub market_narrative: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub competitive_landscape: Option<String>,
    pub why_it_matters: String,
    pub key_signal_shifts: Vec<String>,
    pub scenarios: Vec<Scenario>,
    pub contradictions: Vec<Contradiction>,
    pub citations: Vec<Citation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeStatus {
    pub evidence_count: usize,
    pub semantic_matches: usize,
    pub graph_related_sources: usize,
    pub connected_entities: Vec<String>,
    pub enrichment_triggered: bool,
    pub background_priority_task_id: Option<String>,
    pub enrichment: Option<serde_json::Value>,
}

/// One quarter or fiscal year's headline figures, as surfaced in a trend
/// narrative — a thinned projection of `FinancialPeriod`, not the period
/// itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub period_end: NaiveDate,
    pub revenue: Option<f64>,
    pub net_income: Option<f64>,
    pub gross_profit: Option<f64>,
    pub eps: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoricalTrendsView {
    pub available: bool,
    pub trend_direction: String,
    pub quarters: Vec<PeriodSummary>,
    pub annual: Vec<PeriodSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroIndicator {
    pub series_id: String,
    pub name: String,
    pub value: Option<f64>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MacroContextView {
    pub available: bool,
    pub indicators: Vec<MacroIndicator>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SocialSentimentView {
    pub available: bool,
    pub total_mentions_7d: i64,
    pub avg_sentiment: f64,
    pub sentiment_label: String,
    pub days_data: i64,
}

/// A candidate evidence item prior to ranking: either a stored insight (text
/// search hit) or a pseudo-insight synthesized from a semantic-search chunk
/// whose source wasn't already present in the text hits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceCandidate {
    pub source_id: Option<i64>,
    pub source_name: String,
    pub source_url: String,
    pub text: String,
    pub recommendation: String,
    pub threat_level: ThreatLevel,
    pub confidence: f64,
    pub evidence_ref: String,
    pub critic_status: CriticStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub text_rank: f64,
    pub similarity_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedEvidenceItem {
    pub source_name: String,
    pub source_url: String,
    pub text: String,
    pub recommendation: String,
    pub threat_level: ThreatLevel,
    pub confidence: f64,
    pub evidence_ref: String,
    pub critic_status: CriticStatus,
    pub created_at: DateTime<Utc>,
    pub text_rank: f64,
    pub semantic_score: Option<f64>,
    pub entity_relevance: f64,
    pub rank_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub search_id: i64,
    pub generated_at: DateTime<Utc>,
    pub query_context: QueryContext,
    pub report: ReportSections,
    pub knowledge_status: KnowledgeStatus,
    pub evidence: Vec<RankedEvidenceItem>,
}

/// One message on the progressive streaming channel (§4.8.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageEvent {
    pub stage: String,
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StageEvent {
    pub fn new(stage: impl Into<String>, progress: f64) -> Self {
        Self {
            stage: stage.into(),
            progress: (progress * 100.0).round() / 100.0,
            data: None,
            message: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}
