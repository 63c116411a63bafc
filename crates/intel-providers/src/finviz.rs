use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use intel_core::{Entity, FinancialPeriod, KeyMetrics, PeriodType, ProviderResult, SocialPost, SocialSignal};
use intel_repository::Repository;
use regex::Regex;
use reqwest::Client;

use crate::{err_result, ok_result, Provider};

/// Finviz snapshot page scrape: analyst target price and rating rows. No
/// HTML parser in the dependency stack, so cells are pulled with regexes
/// over the raw response body.
pub struct FinvizProvider {
    client: Client,
    repo: Arc<dyn Repository>,
    target_price_re: Regex,
    rating_row_re: Regex,
}

impl FinvizProvider {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(15))
                .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64)")
                .build()
                .unwrap_or_else(|_| Client::new()),
            repo,
            target_price_re: Regex::new(r#"Target Price</td>\s*<td[^>]*>\s*<b>\s*([\d.]+)"#).unwrap(),
            rating_row_re: Regex::new(
                r#"(?i)(Upgrade|Downgrade|Reiterated|Initiated)[^<]*</td>\s*<td[^>]*>([^<]+)</td>\s*<td[^>]*>([^<]+)</td>"#,
            )
            .unwrap(),
        }
    }

    async fn fetch_html(&self, ticker: &str) -> Option<String> {
        let url = format!("https://finviz.com/quote.ashx?t={ticker}");
        let resp = self.client.get(&url).send().await.ok()?;
        if !resp.status().is_success() {
            return None;
        }
        resp.text().await.ok()
    }

    fn rating_sentiment(action: &str, rating: &str) -> f64 {
        let text = format!("{action} {rating}").to_lowercase();
        let positive = ["buy", "overweight", "outperform"].iter().any(|w| text.contains(w))
            || text.contains("upgrade");
        let negative = ["sell", "underweight"].iter().any(|w| text.contains(w)) || text.contains("downgrade");
        match (positive, negative) {
            (true, false) => 1.0,
            (false, true) => -1.0,
            _ => 0.0,
        }
    }

    async fn store_target_price(&self, entity: &Entity, html: &str) -> bool {
        let Some(caps) = self.target_price_re.captures(html) else { return false };
        let Ok(target) = caps[1].parse::<f64>() else { return false };

        let mut key_metrics = KeyMetrics::default();
        key_metrics.extra.insert("analyst_target_price".to_string(), target);

        let period = FinancialPeriod {
            id: None,
            entity_id: Some(entity.id),
            ticker: entity.ticker.clone(),
            period_type: PeriodType::Quarterly,
            period_end: Utc::now().date_naive(),
            fiscal_year: Utc::now().date_naive().format("%Y").to_string().parse().unwrap_or(0),
            fiscal_quarter: None,
            source_provider: "finviz".to_string(),
            income: Default::default(),
            balance: Default::default(),
            cash_flow: Default::default(),
            key_metrics,
        };
        self.repo.upsert_financial_period(&period).await.is_ok()
    }

    async fn store_ratings(&self, entity: &Entity, html: &str) -> bool {
        let top_posts: Vec<SocialPost> = self
            .rating_row_re
            .captures_iter(html)
            .take(10)
            .map(|caps| {
                let action = caps[1].trim().to_string();
                let firm = caps[2].trim().to_string();
                let rating = caps[3].trim().to_string();
                let sentiment = Self::rating_sentiment(&action, &rating);
                SocialPost {
                    platform: "finviz_analysts".to_string(),
                    title: format!("{firm}: {action} ({rating})"),
                    url: format!("https://finviz.com/quote.ashx?t={}", entity.ticker),
                    sentiment,
                }
            })
            .collect();

        if top_posts.is_empty() {
            return false;
        }

        let mention_count = top_posts.len() as i32;
        let avg_sentiment = top_posts.iter().map(|p| p.sentiment).sum::<f64>() / top_posts.len() as f64;

        let signal = SocialSignal {
            ticker: entity.ticker.clone(),
            platform: "finviz_analysts".to_string(),
            signal_date: Utc::now().date_naive(),
            mention_count,
            avg_sentiment: (avg_sentiment * 1000.0).round() / 1000.0,
            top_posts,
        };
        self.repo.upsert_social_signal(&signal).await.is_ok()
    }
}

#[async_trait]
impl Provider for FinvizProvider {
    fn name(&self) -> &str {
        "finviz"
    }

    fn is_configured(&self) -> bool {
        true
    }

    fn rate_limit_ok(&self) -> bool {
        true
    }

    async fn fetch_company_data(&self, entity: &Entity) -> Vec<ProviderResult> {
        let Some(html) = self.fetch_html(&entity.ticker).await else {
            return vec![err_result("finviz", "analyst", "fetch failed")];
        };

        let mut results = Vec::new();
        if self.store_target_price(entity, &html).await {
            results.push(ok_result("finviz", "target_price", 1));
        }
        if self.store_ratings(entity, &html).await {
            results.push(ok_result("finviz", "analyst_ratings", 1));
        }
        if results.is_empty() {
            results.push(err_result("finviz", "analyst", "no target price or ratings found"));
        }
        results
    }
}
