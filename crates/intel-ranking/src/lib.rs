pub mod contradictions;
pub mod entity_relevance;
pub mod scoring;

pub use contradictions::{build_signal_shifts, detect_contradictions, needs_refresh};
pub use entity_relevance::entity_relevance;
pub use scoring::{rank_evidence, RankingContext};

/// Lowercases and splits on non-alphanumeric boundaries, dropping blanks.
/// Used to build the `tokens` a query is matched against in `token_relevance`.
pub fn tokenize(query_text: &str) -> Vec<String> {
    query_text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_splits_on_punctuation_and_lowercases() {
        assert_eq!(tokenize("Tesla's Q3 Earnings!"), vec!["tesla", "s", "q3", "earnings"]);
    }
}
