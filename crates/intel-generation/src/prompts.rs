use intel_core::{HistoricalTrendsView, MacroContextView, RankedEvidenceItem, SocialSentimentView};
use intel_providers::FinancialSnapshot;

use crate::formatters::{
    fmt_compact, format_evidence_block, format_financials_block, format_macro_block, format_sentiment_block,
    format_trend_block,
};

pub const SYSTEM_ANALYST: &str = "You are the voice of a proprietary financial terminal. \
Write as an authoritative analyst delivering a briefing to a portfolio manager. \
State facts and conclusions directly — never say 'Based on the provided data', \
'According to the data', 'The data suggests', or similar hedging phrases. \
The reader knows the data came from this terminal; do not reference your own process. \
Cite specific numbers inline (e.g. 'Revenue grew 12% YoY to $53.8B'). \
Be concise, assertive, and decision-ready. Avoid filler sentences. \
Resolve conflicts between Evidence and Financials; do not hallucinate missing data if Summary has it.";

pub const SYSTEM_SCENARIO: &str = "You are a scenario planning strategist at a hedge fund. \
Construct three scenarios (bull, base, bear) with specific probability estimates, \
concrete assumptions tied to real metrics, and measurable trigger signals. \
Probabilities must reflect the actual data — if financials are strong, bull should be higher. \
Write assertively. Never say 'Based on the provided data' or similar hedges. \
Output valid JSON only, no other text.";

pub const SYSTEM_COMPETITIVE: &str = "You are a competitive intelligence analyst delivering a terminal briefing. \
Identify key competitors, market positioning, competitive advantages and threats. \
Be specific about market share, product differentiation, and strategic moves. \
State findings directly — never reference 'the data' or your own analysis process. \
Cite evidence inline with specific numbers.";

pub fn executive_summary_prompt(
    query: &str,
    top_evidence: &[RankedEvidenceItem],
    financials: &FinancialSnapshot,
    macro_context: &MacroContextView,
    sentiment: &SocialSentimentView,
    historical: &HistoricalTrendsView,
) -> String {
    format!(
        r#"Analyze the following market intelligence for the query: "{query}"

=== TOP EVIDENCE ===
{evidence}

=== FINANCIAL SNAPSHOT ===
{financials}

=== HISTORICAL TRENDS ===
{trend}

=== MACRO CONTEXT ===
{macro_block}

=== SOCIAL SENTIMENT ===
{sentiment}

Write a structured executive summary using strict Markdown.
Follow this EXACT format:

# [Punchy, data-driven Headline (max 8 words)]

## VERDICT
[One clear sentence stating Bullish/Bearish/Neutral stance with conviction level.]

## KEY DRIVERS
* **[Driver 1]**: [Brief explanation citing specific numbers]
* **[Driver 2]**: [Brief explanation citing specific numbers]
* **[Risk/Catalyst]**: [Brief explanation]

Do not use preamble. Go straight to the # Headline."#,
        query = query,
        evidence = format_evidence_block(top_evidence, 5),
        financials = format_financials_block(financials),
        trend = format_trend_block(historical),
        macro_block = format_macro_block(macro_context),
        sentiment = format_sentiment_block(sentiment),
    )
}

pub fn market_narrative_prompt(
    query: &str,
    top_evidence: &[RankedEvidenceItem],
    financials: &FinancialSnapshot,
    historical: &HistoricalTrendsView,
    macro_context: &MacroContextView,
    sentiment: &SocialSentimentView,
    coverage_score: f64,
    executive_verdict: &str,
) -> String {
    let coverage_note = if coverage_score < 0.3 {
        format!("NOTE: Data coverage is thin (score {:.0}%). Acknowledge gaps explicitly.", coverage_score * 100.0)
    } else if coverage_score >= 0.7 {
        format!("Data coverage is good (score {:.0}%).", coverage_score * 100.0)
    } else {
        String::new()
    };

    let verdict_note = if executive_verdict.is_empty() {
        String::new()
    } else {
        format!(
            "\n=== EXECUTIVE VERDICT (already issued) ===\n{executive_verdict}\n\n\
IMPORTANT: Your narrative MUST be consistent with the above verdict. \
Do not contradict the recommendation or risk assessment.\n"
        )
    };

    format!(
        r#"Write a market intelligence narrative for: "{query}"

=== EVIDENCE ===
{evidence}

=== FINANCIALS ===
{financials}

=== HISTORICAL TRENDS ===
{trend}

=== MACRO ENVIRONMENT ===
{macro_block}

=== SOCIAL SENTIMENT ===
{sentiment}

{coverage_note}
{verdict_note}
Write a deep-dive analysis using these Markdown sections:

## CURRENT SITUATION
[What the data shows regarding financial health, trajectory, and key metrics. Cite numbers.]

## MARKET DYNAMICS
[Macro environment, competitive pressures, and sentiment signals.]

## OUTLOOK & WATCHLIST
[Upcoming catalysts, risk factors, and what to monitor next.]

Ground every claim in specific data from above. No generic statements."#,
        query = query,
        evidence = format_evidence_block(top_evidence, 6),
        financials = format_financials_block(financials),
        trend = format_trend_block(historical),
        macro_block = format_macro_block(macro_context),
        sentiment = format_sentiment_block(sentiment),
        coverage_note = coverage_note,
        verdict_note = verdict_note,
    )
}

pub fn competitive_landscape_prompt(
    query: &str,
    ticker: &str,
    top_evidence: &[RankedEvidenceItem],
    financials: &FinancialSnapshot,
    sector: &str,
    industry: &str,
) -> String {
    let sector_info = if sector.is_empty() && industry.is_empty() {
        String::new()
    } else {
        format!("Sector: {sector}  |  Industry: {industry}")
    };

    format!(
        r#"Analyze the competitive landscape for {query} ({ticker}):

{sector_info}

=== FINANCIAL POSITION ===
{financials}

=== MARKET EVIDENCE ===
{evidence}

Write a competitive analysis using these Markdown sections:

## COMPETITIVE POSITION
[Key competitors, market share dynamics, and positioning.]

## ADVANTAGES
[Moats, unique strengths, or distinct capabilities.]

## STRATEGIC THREATS
[Vulnerabilities and moves to watch in the next 6-12 months.]

Ground every claim in the data provided."#,
        query = query,
        ticker = ticker,
        sector_info = sector_info,
        financials = format_financials_block(financials),
        evidence = format_evidence_block(top_evidence, 6),
    )
}

pub fn scenarios_prompt(
    query: &str,
    top_evidence: &[RankedEvidenceItem],
    financials: &FinancialSnapshot,
    historical: &HistoricalTrendsView,
    macro_context: &MacroContextView,
) -> String {
    format!(
        r#"Given this market intelligence for "{query}":

=== EVIDENCE ===
{evidence}

=== FINANCIALS ===
{financials}

=== HISTORICAL TRENDS ===
{trend}

=== MACRO ===
{macro_block}

Generate three scenarios. Respond ONLY with a JSON array, no other text:
[
  {{
    "name": "bull",
    "probability": <0.0-1.0>,
    "assumption": "<specific assumption grounded in the data>",
    "impact": "<concrete impact description with numbers if possible>",
    "trigger_signals": ["<signal 1>", "<signal 2>", "<signal 3>"]
  }},
  {{
    "name": "base",
    "probability": <0.0-1.0>,
    "assumption": "...",
    "impact": "...",
    "trigger_signals": ["...", "...", "..."]
  }},
  {{
    "name": "bear",
    "probability": <0.0-1.0>,
    "assumption": "...",
    "impact": "...",
    "trigger_signals": ["...", "...", "..."]
  }}
]

Probabilities must sum to 1.0. Base assumptions on actual data provided. Verify any percentage calculations against the current price to ensure they are mathematically accurate."#,
        query = query,
        evidence = format_evidence_block(top_evidence, 5),
        financials = format_financials_block(financials),
        trend = format_trend_block(historical),
        macro_block = format_macro_block(macro_context),
    )
}

pub fn recommendation_prompt(
    query: &str,
    risk_level: &str,
    confidence: f64,
    current_price: Option<f64>,
    answer_summary: &str,
    contradictions: &[(String, String)],
    coverage_score: f64,
) -> String {
    let contra_text = if contradictions.is_empty() {
        String::new()
    } else {
        let lines: Vec<String> = contradictions.iter().map(|(kind, detail)| format!("- {kind}: {detail}")).collect();
        format!("CONTRADICTIONS:\n{}", lines.join("\n"))
    };
    let price_text = current_price.map(|p| format!("Current Price: {p}\n")).unwrap_or_default();

    format!(
        r#"Decision context for "{query}":

Risk Level: {risk_level}
Confidence: {confidence}
{price_text}Current Summary: {answer_summary}
Data Coverage: {coverage:.0}%
{contra_text}

Write a direct, assertive recommendation in 2-3 sentences. Plain text only, no markdown.
Rules:
1. Start with a clear action verb (BUY / SELL / HOLD / ACCUMULATE / REDUCE / MONITOR).
2. State specific conditions or price triggers to watch.
3. Include timeline or urgency.
4. NEVER start with 'Based on the provided data', 'The data suggests', or any similar hedge.
5. Write as if you ARE the terminal delivering a verdict, not an AI summarizing data.
6. Ensure any price targets or percentage changes are mathematically accurate and calculated based on the Current Price (if provided).

If data coverage is low, state what is missing and recommend gathering it before acting."#,
        query = query,
        risk_level = risk_level,
        confidence = confidence,
        price_text = price_text,
        answer_summary = answer_summary,
        coverage = coverage_score * 100.0,
        contra_text = contra_text,
    )
}

pub fn trend_analysis_prompt(ticker: &str, historical: &HistoricalTrendsView) -> String {
    let q_lines: Vec<String> = historical
        .quarters
        .iter()
        .take(8)
        .map(|q| format!("  {}: Rev={} NI={} GP={} EPS={}", q.period_end, fmt_compact(q.revenue), fmt_compact(q.net_income), fmt_compact(q.gross_profit), q.eps.map(|e| e.to_string()).unwrap_or_else(|| "n/a".to_string())))
        .collect();
    let a_lines: Vec<String> = historical
        .annual
        .iter()
        .take(5)
        .map(|a| format!("  {}: Rev={} NI={} GP={}", a.period_end, fmt_compact(a.revenue), fmt_compact(a.net_income), fmt_compact(a.gross_profit)))
        .collect();

    format!(
        r#"Analyze the financial trends for {ticker}:

QUARTERLY (most recent first):
{quarterly}

ANNUAL (most recent first):
{annual}

Write a 2-3 sentence analysis covering:
1. Revenue trajectory (growing/declining/stable, acceleration/deceleration)
2. Margin trends (gross/net margin compression or expansion)
3. Any inflection points or notable quarter-over-quarter changes

Use specific numbers and percentages from the data."#,
        ticker = ticker,
        quarterly = if q_lines.is_empty() { "  No quarterly data".to_string() } else { q_lines.join("\n") },
        annual = if a_lines.is_empty() { "  No annual data".to_string() } else { a_lines.join("\n") },
    )
}
