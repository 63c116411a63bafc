use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use intel_core::{Entity, ProviderResult, SocialPost, SocialSignal};
use intel_repository::Repository;
use regex::Regex;
use reqwest::Client;

use crate::{err_result, ok_result, Provider};

/// Options put/call ratio proxy via marketchameleon.com (Cboe doesn't
/// publish a public per-symbol API).
pub struct CboeProvider {
    client: Client,
    repo: Arc<dyn Repository>,
    put_call_re: Regex,
}

impl CboeProvider {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(15))
                .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64)")
                .build()
                .unwrap_or_else(|_| Client::new()),
            repo,
            put_call_re: Regex::new(r#"Put/Call Ratio[\s:]*([\d.]+)"#).unwrap(),
        }
    }

    fn sentiment_for(ratio: f64) -> (f64, &'static str) {
        if ratio > 1.0 {
            (-0.5, "put-heavy options flow, bearish positioning")
        } else if ratio < 0.7 {
            (0.5, "call-heavy options flow, bullish positioning")
        } else {
            (0.0, "balanced options flow")
        }
    }
}

#[async_trait]
impl Provider for CboeProvider {
    fn name(&self) -> &str {
        "cboe"
    }

    fn is_configured(&self) -> bool {
        true
    }

    fn rate_limit_ok(&self) -> bool {
        true
    }

    async fn fetch_company_data(&self, entity: &Entity) -> Vec<ProviderResult> {
        let url = format!("https://marketchameleon.com/Overview/{}/", entity.ticker);
        let Ok(resp) = self.client.get(&url).send().await else {
            return vec![err_result("cboe", "options", "fetch failed")];
        };
        if !resp.status().is_success() {
            return vec![err_result("cboe", "options", "non-success response")];
        }
        let Ok(html) = resp.text().await else {
            return vec![err_result("cboe", "options", "empty body")];
        };

        let Some(caps) = self.put_call_re.captures(&html) else {
            return vec![err_result("cboe", "options", "put/call ratio not found on page")];
        };
        let Ok(ratio) = caps[1].parse::<f64>() else {
            return vec![err_result("cboe", "options", "could not parse ratio")];
        };

        let (sentiment, summary) = Self::sentiment_for(ratio);
        let signal = SocialSignal {
            ticker: entity.ticker.clone(),
            platform: "cboe_options".to_string(),
            signal_date: Utc::now().date_naive(),
            mention_count: 1,
            avg_sentiment: sentiment,
            top_posts: vec![SocialPost {
                platform: "cboe_options".to_string(),
                title: format!("Put/call ratio {ratio:.2}: {summary}"),
                url,
                sentiment,
            }],
        };

        if self.repo.upsert_social_signal(&signal).await.is_ok() {
            vec![ok_result("cboe", "options", 1)]
        } else {
            vec![err_result("cboe", "options", "failed to store signal")]
        }
    }
}
