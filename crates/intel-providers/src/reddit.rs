use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use intel_core::{Entity, ProviderResult, SocialPost, SocialSignal};
use intel_repository::Repository;
use reqwest::Client;

use crate::{err_result, ok_result, Provider};

const SUBREDDITS: &[&str] = &["wallstreetbets", "stocks", "investing", "stockmarket", "options"];

const POSITIVE_WORDS: &[&str] = &[
    "bullish", "bull", "buy", "long", "moon", "rocket", "undervalued", "breakout", "calls",
    "growth", "beat", "strong", "rally", "surge", "upgrade", "outperform", "profit", "gain",
    "green", "up",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bearish", "bear", "sell", "short", "crash", "overvalued", "dump", "puts", "decline", "miss",
    "weak", "drop", "downgrade", "underperform", "loss", "red", "down", "bubble", "risk",
    "warning",
];

struct RedditHit {
    title: String,
    url: String,
    num_comments: i64,
    sentiment: f64,
}

fn score_sentiment(text: &str) -> f64 {
    let lower = text.to_lowercase();
    let pos = POSITIVE_WORDS.iter().filter(|w| lower.contains(*w)).count() as f64;
    let neg = NEGATIVE_WORDS.iter().filter(|w| lower.contains(*w)).count() as f64;
    if pos + neg == 0.0 {
        return 0.0;
    }
    ((pos - neg) / (pos + neg) * 1000.0).round() / 1000.0
}

/// Reddit public search JSON endpoint, no auth. Aggregates one
/// `SocialSignal` per ticker per day across all configured subreddits.
pub struct RedditProvider {
    client: Client,
    repo: Arc<dyn Repository>,
}

impl RedditProvider {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(15))
                .user_agent("intel-ingestion/1.0")
                .build()
                .unwrap_or_else(|_| Client::new()),
            repo,
        }
    }

    async fn search_subreddit(&self, subreddit: &str, query: &str) -> Vec<RedditHit> {
        let url = format!("https://www.reddit.com/r/{subreddit}/search.json");
        let resp = self
            .client
            .get(&url)
            .query(&[("q", query), ("restrict_sr", "on"), ("sort", "relevance"), ("t", "week"), ("limit", "25")])
            .send()
            .await;

        let Ok(resp) = resp else { return Vec::new() };
        if resp.status().as_u16() == 429 {
            tokio::time::sleep(Duration::from_secs(3)).await;
            return Vec::new();
        }
        if !resp.status().is_success() {
            return Vec::new();
        }
        let Ok(body) = resp.json::<serde_json::Value>().await else { return Vec::new() };
        let Some(children) = body.pointer("/data/children").and_then(|v| v.as_array()) else {
            return Vec::new();
        };

        children
            .iter()
            .filter_map(|child| {
                let post = child.get("data")?;
                let title = post.get("title")?.as_str()?.to_string();
                let permalink = post.get("permalink").and_then(|v| v.as_str()).unwrap_or_default();
                let url = format!("https://www.reddit.com{permalink}");
                let num_comments = post.get("num_comments").and_then(|v| v.as_i64()).unwrap_or(0);
                let sentiment = score_sentiment(&title);
                Some(RedditHit { title, url, num_comments, sentiment })
            })
            .collect()
    }

    async fn build_signal(&self, entity: &Entity) -> Option<SocialSignal> {
        let mut all_hits: Vec<RedditHit> = Vec::new();
        let mut seen_urls = std::collections::BTreeSet::new();

        for subreddit in SUBREDDITS {
            for query in [&entity.ticker, &entity.name] {
                if query.is_empty() {
                    continue;
                }
                let hits = self.search_subreddit(subreddit, query).await;
                for hit in hits {
                    if seen_urls.insert(hit.url.clone()) {
                        all_hits.push(hit);
                    }
                }
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }

        if all_hits.is_empty() {
            return None;
        }

        let mention_count = all_hits.len() as i32;
        let avg_sentiment = all_hits.iter().map(|h| h.sentiment).sum::<f64>() / all_hits.len() as f64;

        all_hits.sort_by(|a, b| {
            let score_a = a.sentiment.abs() * (a.num_comments.max(1) as f64);
            let score_b = b.sentiment.abs() * (b.num_comments.max(1) as f64);
            score_b.partial_cmp(&score_a).unwrap_or(std::cmp::Ordering::Equal)
        });

        let top_posts: Vec<SocialPost> = all_hits
            .into_iter()
            .take(intel_core::SocialSignal::MAX_TOP_POSTS)
            .map(|h| SocialPost {
                platform: "reddit".to_string(),
                title: h.title,
                url: h.url,
                sentiment: h.sentiment,
            })
            .collect();

        Some(SocialSignal {
            ticker: entity.ticker.clone(),
            platform: "reddit".to_string(),
            signal_date: Utc::now().date_naive(),
            mention_count,
            avg_sentiment: (avg_sentiment * 1000.0).round() / 1000.0,
            top_posts,
        })
    }
}

#[async_trait]
impl Provider for RedditProvider {
    fn name(&self) -> &str {
        "reddit"
    }

    fn is_configured(&self) -> bool {
        true
    }

    fn rate_limit_ok(&self) -> bool {
        true
    }

    async fn fetch_company_data(&self, entity: &Entity) -> Vec<ProviderResult> {
        match self.build_signal(entity).await {
            Some(signal) => {
                if self.repo.upsert_social_signal(&signal).await.is_ok() {
                    vec![ok_result("reddit", "social", 1)]
                } else {
                    vec![err_result("reddit", "social", "failed to store signal")]
                }
            }
            None => vec![err_result("reddit", "social", "no matching posts found")],
        }
    }
}
