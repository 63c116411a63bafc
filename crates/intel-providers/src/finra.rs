use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use intel_core::{Entity, ProviderResult, SocialPost, SocialSignal};
use intel_repository::Repository;
use regex::Regex;
use reqwest::Client;

use crate::{err_result, ok_result, Provider};

/// Short-interest proxy via fintel.io (FINRA doesn't publish a public API).
pub struct FinraProvider {
    client: Client,
    repo: Arc<dyn Repository>,
    short_interest_re: Regex,
}

impl FinraProvider {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(15))
                .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64)")
                .build()
                .unwrap_or_else(|_| Client::new()),
            repo,
            short_interest_re: Regex::new(r#"Short Interest\s*%?\s*Float[^0-9]*([\d.]+)\s*%"#).unwrap(),
        }
    }

    fn sentiment_for(pct: f64) -> (f64, &'static str) {
        if pct > 20.0 {
            (-0.5, "heavy short interest, potential for a squeeze but bearish crowd positioning")
        } else if pct < 5.0 {
            (0.5, "low short interest, bullish-to-neutral crowd positioning")
        } else {
            (0.0, "moderate short interest, no strong positioning signal")
        }
    }
}

#[async_trait]
impl Provider for FinraProvider {
    fn name(&self) -> &str {
        "finra"
    }

    fn is_configured(&self) -> bool {
        true
    }

    fn rate_limit_ok(&self) -> bool {
        true
    }

    async fn fetch_company_data(&self, entity: &Entity) -> Vec<ProviderResult> {
        let url = format!("https://fintel.io/ss/us/{}", entity.ticker);
        let Ok(resp) = self.client.get(&url).send().await else {
            return vec![err_result("finra", "short_interest", "fetch failed")];
        };
        if !resp.status().is_success() {
            return vec![err_result("finra", "short_interest", "non-success response")];
        }
        let Ok(html) = resp.text().await else {
            return vec![err_result("finra", "short_interest", "empty body")];
        };

        let Some(caps) = self.short_interest_re.captures(&html) else {
            return vec![err_result("finra", "short_interest", "short interest not found on page")];
        };
        let Ok(pct) = caps[1].parse::<f64>() else {
            return vec![err_result("finra", "short_interest", "could not parse percentage")];
        };

        let (sentiment, summary) = Self::sentiment_for(pct);
        let signal = SocialSignal {
            ticker: entity.ticker.clone(),
            platform: "finra_short_interest".to_string(),
            signal_date: Utc::now().date_naive(),
            mention_count: 1,
            avg_sentiment: sentiment,
            top_posts: vec![SocialPost {
                platform: "finra_short_interest".to_string(),
                title: format!("Short interest {pct:.1}% of float: {summary}"),
                url,
                sentiment,
            }],
        };

        if self.repo.upsert_social_signal(&signal).await.is_ok() {
            vec![ok_result("finra", "short_interest", 1)]
        } else {
            vec![err_result("finra", "short_interest", "failed to store signal")]
        }
    }
}
