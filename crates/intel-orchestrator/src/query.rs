use intel_core::{Entity, Intent, QueryContext, Timeframe};
use intel_entity_resolver::EntityResolver;

const QUARTER_WORDS: &[&str] = &["quarter", "q1", "q2", "q3", "q4", "qtr"];
const YEAR_WORDS: &[&str] = &["year", "annual", "yoy", "fy"];
const RECENT_WORDS: &[&str] = &["week", "today", "latest", "recent", "now"];

const RISK_WORDS: &[&str] = &["risk", "threat", "exposure", "danger"];
const FINANCIAL_WORDS: &[&str] = &["growth", "revenue", "earnings", "profit", "margin", "financial"];
const MARKET_WORDS: &[&str] = &["pricing", "competition", "market", "strategy", "sector", "industry", "compet"];

const MIN_TOKEN_LEN: usize = 2;

/// Lowercases, strips punctuation, splits on whitespace, drops tokens
/// shorter than two characters and de-duplicates while preserving
/// first-seen order. Distinct from `intel_ranking::tokenize`, which keeps
/// every token for relevance scoring.
fn query_tokens(query_text: &str) -> Vec<String> {
    let lowered = query_text.to_lowercase().replace(',', " ");
    let mut seen = std::collections::HashSet::new();
    let mut tokens = Vec::new();
    for raw in lowered.split_whitespace() {
        let cleaned: String = raw.chars().filter(|c| c.is_alphanumeric()).collect();
        if cleaned.len() < MIN_TOKEN_LEN {
            continue;
        }
        if seen.insert(cleaned.clone()) {
            tokens.push(cleaned);
        }
    }
    tokens
}

fn classify_timeframe(tokens: &[String]) -> Timeframe {
    if tokens.iter().any(|t| QUARTER_WORDS.contains(&t.as_str())) {
        Timeframe::Quarter
    } else if tokens.iter().any(|t| YEAR_WORDS.contains(&t.as_str())) {
        Timeframe::Year
    } else if tokens.iter().any(|t| RECENT_WORDS.contains(&t.as_str())) {
        Timeframe::Recent
    } else {
        Timeframe::Current
    }
}

fn classify_intent(tokens: &[String]) -> Intent {
    if tokens.iter().any(|t| RISK_WORDS.contains(&t.as_str())) {
        Intent::Risk
    } else if tokens.iter().any(|t| FINANCIAL_WORDS.contains(&t.as_str())) {
        Intent::Financial
    } else if tokens.iter().any(|t| MARKET_WORDS.contains(&t.as_str())) {
        Intent::Market
    } else {
        Intent::General
    }
}

/// Parses free text into a structured query context, resolving the leading
/// entity mention along the way. Grounded on
/// `core/pipeline/query.py::_parse_query`.
pub async fn parse_query(resolver: &EntityResolver, query_text: &str) -> (QueryContext, Vec<String>, Option<Entity>) {
    let tokens = query_tokens(query_text);
    let timeframe = classify_timeframe(&tokens);
    let intent = classify_intent(&tokens);

    let entity = match resolver.resolve_entity(query_text, None).await {
        Ok(entity) => entity,
        Err(error) => {
            tracing::warn!(%error, query = query_text, "entity resolution failed");
            None
        }
    };

    let fallback_name = query_text.split_whitespace().next().unwrap_or(query_text).to_string();
    let (entity_name, ticker) = match &entity {
        Some(e) => (e.name.clone(), Some(e.ticker.clone())),
        None => (fallback_name, None),
    };

    let context = QueryContext { entity: Some(entity_name), ticker, timeframe, intent };
    (context, tokens, entity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_quarter_timeframe_and_financial_intent() {
        let tokens = query_tokens("Apple Q3 earnings");
        assert_eq!(classify_timeframe(&tokens), Timeframe::Quarter);
        assert_eq!(classify_intent(&tokens), Intent::Financial);
    }

    #[test]
    fn classifies_general_intent_by_default() {
        let tokens = query_tokens("tell me about it");
        assert_eq!(classify_intent(&tokens), Intent::General);
    }

    #[test]
    fn query_tokens_drops_short_tokens_and_dedupes() {
        let tokens = query_tokens("AI AI is a a big big deal");
        assert_eq!(tokens, vec!["ai", "is", "big", "deal"]);
    }
}
