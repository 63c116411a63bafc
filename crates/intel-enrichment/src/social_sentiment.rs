use intel_core::{IntelResult, SocialSentimentView};
use intel_repository::Repository;
use serde_json::json;

const LOOKBACK_DAYS: i64 = 7;
const MAX_TOP_POSTS: usize = 5;
const BULLISH_THRESHOLD: f64 = 0.2;
const BEARISH_THRESHOLD: f64 = -0.2;

fn sentiment_label(avg: f64) -> &'static str {
    if avg > BULLISH_THRESHOLD {
        "bullish"
    } else if avg < BEARISH_THRESHOLD {
        "bearish"
    } else {
        "neutral"
    }
}

/// Builds the social-sentiment section from stored signal rows, per
/// `core/pipeline/enrichment.py::_build_social_sentiment`.
pub async fn build_social_sentiment(repo: &dyn Repository, ticker: Option<&str>) -> IntelResult<(SocialSentimentView, serde_json::Value)> {
    let Some(ticker) = ticker else {
        return Ok((SocialSentimentView::default(), json!({ "available": false })));
    };

    let signals = repo.get_social_signals(ticker, LOOKBACK_DAYS).await?;
    if signals.is_empty() {
        return Ok((SocialSentimentView::default(), json!({ "available": false })));
    }

    let total_mentions: i64 = signals.iter().map(|s| s.mention_count as i64).sum();
    let avg_sentiment = signals.iter().map(|s| s.avg_sentiment).sum::<f64>() / signals.len() as f64;
    let label = sentiment_label(avg_sentiment);
    let days_data = signals.len() as i64;

    let mut top_posts: Vec<_> = signals.iter().flat_map(|s| s.top_posts.iter()).collect();
    top_posts.sort_by(|a, b| b.sentiment.abs().partial_cmp(&a.sentiment.abs()).unwrap_or(std::cmp::Ordering::Equal));
    top_posts.truncate(MAX_TOP_POSTS);

    let view = SocialSentimentView {
        available: true,
        total_mentions_7d: total_mentions,
        avg_sentiment,
        sentiment_label: label.to_string(),
        days_data,
    };

    let payload = json!({
        "available": true,
        "total_mentions_7d": total_mentions,
        "avg_sentiment": avg_sentiment,
        "sentiment_label": label,
        "days_data": days_data,
        "top_posts": top_posts.iter().map(|p| json!({
            "platform": p.platform,
            "title": p.title,
            "url": p.url,
            "sentiment": p.sentiment,
        })).collect::<Vec<_>>(),
    });

    Ok((view, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentiment_label_classifies_bullish() {
        assert_eq!(sentiment_label(0.5), "bullish");
    }

    #[test]
    fn sentiment_label_classifies_bearish() {
        assert_eq!(sentiment_label(-0.5), "bearish");
    }

    #[test]
    fn sentiment_label_classifies_neutral() {
        assert_eq!(sentiment_label(0.0), "neutral");
    }
}
