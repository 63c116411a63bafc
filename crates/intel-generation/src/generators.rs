use intel_core::{Contradiction, HistoricalTrendsView, MacroContextView, RankedEvidenceItem, SocialSentimentView};
use intel_providers::FinancialSnapshot;

use crate::client::GenerationClient;
use crate::formatters::parse_json_array;
use crate::prompts::{
    competitive_landscape_prompt, executive_summary_prompt, market_narrative_prompt, recommendation_prompt,
    scenarios_prompt, trend_analysis_prompt, SYSTEM_ANALYST, SYSTEM_COMPETITIVE, SYSTEM_SCENARIO,
};

pub async fn generate_executive_summary(
    client: &GenerationClient,
    query: &str,
    top_evidence: &[RankedEvidenceItem],
    financials: &FinancialSnapshot,
    macro_context: &MacroContextView,
    sentiment: &SocialSentimentView,
    historical: &HistoricalTrendsView,
) -> Option<String> {
    let prompt = executive_summary_prompt(query, top_evidence, financials, macro_context, sentiment, historical);
    client.generate_async(&prompt, SYSTEM_ANALYST, 0.25, 384).await
}

#[allow(clippy::too_many_arguments)]
pub async fn generate_market_narrative(
    client: &GenerationClient,
    query: &str,
    top_evidence: &[RankedEvidenceItem],
    financials: &FinancialSnapshot,
    historical: &HistoricalTrendsView,
    macro_context: &MacroContextView,
    sentiment: &SocialSentimentView,
    coverage_score: f64,
    executive_verdict: &str,
) -> Option<String> {
    let prompt = market_narrative_prompt(
        query,
        top_evidence,
        financials,
        historical,
        macro_context,
        sentiment,
        coverage_score,
        executive_verdict,
    );
    client.generate_async(&prompt, SYSTEM_ANALYST, 0.3, 512).await
}

pub async fn generate_competitive_landscape(
    client: &GenerationClient,
    query: &str,
    ticker: &str,
    top_evidence: &[RankedEvidenceItem],
    financials: &FinancialSnapshot,
    sector: &str,
    industry: &str,
) -> Option<String> {
    let prompt = competitive_landscape_prompt(query, ticker, top_evidence, financials, sector, industry);
    client.generate_async(&prompt, SYSTEM_COMPETITIVE, 0.3, 384).await
}

/// Token-streamed variant of [`generate_executive_summary`], used by the
/// stream pipeline to emit `decision_token` progress events. Shares the
/// response cache with `generate_executive_summary`/`generate_parallel_intelligence`
/// since the prompt/system/temperature/max_tokens are identical.
pub async fn generate_executive_summary_tokens(
    client: &GenerationClient,
    query: &str,
    top_evidence: &[RankedEvidenceItem],
    financials: &FinancialSnapshot,
    macro_context: &MacroContextView,
    sentiment: &SocialSentimentView,
    historical: &HistoricalTrendsView,
) -> Option<Vec<String>> {
    let prompt = executive_summary_prompt(query, top_evidence, financials, macro_context, sentiment, historical);
    client.generate_stream(&prompt, SYSTEM_ANALYST, 0.25, 384).await
}

/// Token-streamed variant of [`generate_market_narrative`] for `narrative_token`
/// progress events. Uses an empty `executive_verdict`, matching the prompt
/// `generate_parallel_intelligence` builds for its own narrative call so both
/// share one cache entry.
#[allow(clippy::too_many_arguments)]
pub async fn generate_market_narrative_tokens(
    client: &GenerationClient,
    query: &str,
    top_evidence: &[RankedEvidenceItem],
    financials: &FinancialSnapshot,
    historical: &HistoricalTrendsView,
    macro_context: &MacroContextView,
    sentiment: &SocialSentimentView,
    coverage_score: f64,
) -> Option<Vec<String>> {
    let prompt = market_narrative_prompt(query, top_evidence, financials, historical, macro_context, sentiment, coverage_score, "");
    client.generate_stream(&prompt, SYSTEM_ANALYST, 0.3, 512).await
}

/// Token-streamed variant of [`generate_competitive_landscape`] for
/// `competitive_token` progress events.
pub async fn generate_competitive_landscape_tokens(
    client: &GenerationClient,
    query: &str,
    ticker: &str,
    top_evidence: &[RankedEvidenceItem],
    financials: &FinancialSnapshot,
    sector: &str,
    industry: &str,
) -> Option<Vec<String>> {
    let prompt = competitive_landscape_prompt(query, ticker, top_evidence, financials, sector, industry);
    client.generate_stream(&prompt, SYSTEM_COMPETITIVE, 0.3, 384).await
}

/// Generates and parses the three-scenario JSON array. Returns `None` if
/// generation or parsing fails so the caller falls back to the arithmetic
/// scenario builder in `intel-enrichment`.
pub async fn generate_scenarios(
    client: &GenerationClient,
    query: &str,
    top_evidence: &[RankedEvidenceItem],
    financials: &FinancialSnapshot,
    historical: &HistoricalTrendsView,
    macro_context: &MacroContextView,
) -> Option<serde_json::Value> {
    let prompt = scenarios_prompt(query, top_evidence, financials, historical, macro_context);
    let raw = client.generate_async(&prompt, SYSTEM_SCENARIO, 0.3, 512).await?;
    parse_json_array(&raw)
}

pub async fn generate_recommendation(
    client: &GenerationClient,
    query: &str,
    risk_level: &str,
    confidence: f64,
    current_price: Option<f64>,
    answer_summary: &str,
    contradictions: &[Contradiction],
    coverage_score: f64,
) -> Option<String> {
    let pairs: Vec<(String, String)> = contradictions.iter().map(|c| (c.kind.clone(), c.detail.clone())).collect();
    let prompt = recommendation_prompt(query, risk_level, confidence, current_price, answer_summary, &pairs, coverage_score);
    client.generate_async(&prompt, SYSTEM_ANALYST, 0.25, 192).await
}

pub async fn generate_trend_analysis(client: &GenerationClient, ticker: &str, historical: &HistoricalTrendsView) -> Option<String> {
    let prompt = trend_analysis_prompt(ticker, historical);
    client.generate_async(&prompt, SYSTEM_ANALYST, 0.25, 256).await
}

/// Output of the combined executive/narrative/scenarios/trend/recommendation
/// fan-out, per `core/llm/generators.py::generate_parallel_intelligence`.
#[derive(Debug, Clone, Default)]
pub struct ParallelIntelligence {
    pub executive_summary: Option<String>,
    pub market_narrative: Option<String>,
    pub scenarios: Option<serde_json::Value>,
    pub trend_analysis: Option<String>,
    pub recommendation: Option<String>,
    pub competitive_landscape: Option<String>,
}

/// Runs executive summary, narrative, scenarios, and (if historical data
/// exists) trend analysis, then recommendation once the executive summary
/// is in hand. On the local Ollama backend all independent tasks run
/// concurrently, gated only by the client's semaphore; on a cloud backend
/// they run sequentially with a rate-limit gap between calls, matching
/// `providers.py::_is_cloud_provider`'s branch in the Python original.
#[allow(clippy::too_many_arguments)]
pub async fn generate_parallel_intelligence(
    client: &GenerationClient,
    query: &str,
    ticker: Option<&str>,
    top_evidence: &[RankedEvidenceItem],
    financials: &FinancialSnapshot,
    historical: &HistoricalTrendsView,
    macro_context: &MacroContextView,
    sentiment: &SocialSentimentView,
    contradictions: &[Contradiction],
    coverage_score: f64,
) -> ParallelIntelligence {
    let summary_prompt = executive_summary_prompt(query, top_evidence, financials, macro_context, sentiment, historical);
    let narrative_prompt = market_narrative_prompt(query, top_evidence, financials, historical, macro_context, sentiment, coverage_score, "");
    let scenarios_prompt_text = scenarios_prompt(query, top_evidence, financials, historical, macro_context);
    let trend_prompt = if (historical.quarters.is_empty() && historical.annual.is_empty()) || ticker.is_none() {
        None
    } else {
        Some(trend_analysis_prompt(ticker.unwrap_or_default(), historical))
    };
    let competitive_prompt = ticker.map(|t| {
        competitive_landscape_prompt(
            query,
            t,
            top_evidence,
            financials,
            financials.sector.as_deref().unwrap_or(""),
            financials.industry.as_deref().unwrap_or(""),
        )
    });

    let (executive_summary, market_narrative, scenarios_raw, trend_analysis, competitive_landscape) = if client.is_cloud() {
        let executive_summary = client.generate_async(&summary_prompt, SYSTEM_ANALYST, 0.25, 384).await;
        client.rate_limit_gap().await;
        let market_narrative = client.generate_async(&narrative_prompt, SYSTEM_ANALYST, 0.3, 512).await;
        client.rate_limit_gap().await;
        let scenarios_raw = client.generate_async(&scenarios_prompt_text, SYSTEM_SCENARIO, 0.3, 512).await;
        client.rate_limit_gap().await;
        let trend_analysis = match &trend_prompt {
            Some(prompt) => client.generate_async(prompt, SYSTEM_ANALYST, 0.25, 256).await,
            None => None,
        };
        client.rate_limit_gap().await;
        let competitive_landscape = match &competitive_prompt {
            Some(prompt) => client.generate_async(prompt, SYSTEM_COMPETITIVE, 0.3, 384).await,
            None => None,
        };
        (executive_summary, market_narrative, scenarios_raw, trend_analysis, competitive_landscape)
    } else {
        let trend_future = async {
            match &trend_prompt {
                Some(prompt) => client.generate_async(prompt, SYSTEM_ANALYST, 0.25, 256).await,
                None => None,
            }
        };
        let competitive_future = async {
            match &competitive_prompt {
                Some(prompt) => client.generate_async(prompt, SYSTEM_COMPETITIVE, 0.3, 384).await,
                None => None,
            }
        };
        tokio::join!(
            client.generate_async(&summary_prompt, SYSTEM_ANALYST, 0.25, 384),
            client.generate_async(&narrative_prompt, SYSTEM_ANALYST, 0.3, 512),
            client.generate_async(&scenarios_prompt_text, SYSTEM_SCENARIO, 0.3, 512),
            trend_future,
            competitive_future,
        )
    };

    let scenarios = scenarios_raw.as_deref().and_then(parse_json_array);

    let recommendation = match &executive_summary {
        Some(summary) => {
            let excerpt: String = summary.chars().take(200).collect();
            let pairs: Vec<(String, String)> = contradictions.iter().map(|c| (c.kind.clone(), c.detail.clone())).collect();
            let prompt = recommendation_prompt(
                query,
                "medium",
                0.5,
                financials.price,
                &excerpt,
                &pairs,
                coverage_score,
            );
            client.generate_async(&prompt, SYSTEM_ANALYST, 0.25, 192).await
        }
        None => None,
    };

    ParallelIntelligence { executive_summary, market_narrative, scenarios, trend_analysis, recommendation, competitive_landscape }
}
