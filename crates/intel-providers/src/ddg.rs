use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use intel_core::{ConnectorType, Entity, ProviderResult};
use intel_repository::Repository;
use regex::Regex;
use reqwest::Client;

use crate::{err_result, ok_result, Provider};

const MAX_RESULTS: usize = 15;

/// DuckDuckGo web/news discovery against the HTML lite endpoint, used as a
/// dependency-free substitute for a packaged search client: result rows
/// are pulled out of the response body with regexes rather than parsed.
pub struct DdgProvider {
    client: Client,
    repo: Arc<dyn Repository>,
    result_re: Regex,
}

impl DdgProvider {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(15))
                .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64)")
                .build()
                .unwrap_or_else(|_| Client::new()),
            repo,
            result_re: Regex::new(
                r#"<a[^>]*class="result__a"[^>]*href="([^"]+)"[^>]*>(.*?)</a>"#,
            )
            .unwrap(),
        }
    }

    fn strip_tags(text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut in_tag = false;
        for c in text.chars() {
            match c {
                '<' => in_tag = true,
                '>' => in_tag = false,
                _ if !in_tag => out.push(c),
                _ => {}
            }
        }
        html_unescape(out.trim())
    }

    async fn search(&self, query: &str) -> Vec<(String, String)> {
        let resp = self
            .client
            .get("https://html.duckduckgo.com/html/")
            .query(&[("q", query)])
            .send()
            .await;
        let Ok(resp) = resp else { return Vec::new() };
        if !resp.status().is_success() {
            return Vec::new();
        }
        let Ok(body) = resp.text().await else { return Vec::new() };

        self.result_re
            .captures_iter(&body)
            .take(MAX_RESULTS)
            .filter_map(|caps| {
                let href = caps.get(1)?.as_str().to_string();
                let title = Self::strip_tags(caps.get(2)?.as_str());
                if title.is_empty() {
                    None
                } else {
                    Some((title, href))
                }
            })
            .collect()
    }

    async fn register_hits(&self, hits: Vec<(String, String)>, kind: &str, ticker: &str) -> i64 {
        let mut stored = 0i64;
        for (title, url) in hits {
            let truncated: String = title.chars().take(120).collect();
            let name = format!("[DDG-{kind}] {truncated} ({ticker})");
            if self
                .repo
                .add_source(&name, &url, ConnectorType::Web)
                .await
                .is_ok()
            {
                stored += 1;
            }
        }
        stored
    }
}

fn html_unescape(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
}

#[async_trait]
impl Provider for DdgProvider {
    fn name(&self) -> &str {
        "ddg"
    }

    fn is_configured(&self) -> bool {
        true
    }

    fn rate_limit_ok(&self) -> bool {
        true
    }

    async fn fetch_company_data(&self, entity: &Entity) -> Vec<ProviderResult> {
        let ticker = &entity.ticker;
        let name = &entity.name;

        let web_query = format!("\"{ticker}\" OR \"{name}\" financial analysis outlook");
        let news_query = format!("\"{name}\" {ticker} news analysis");

        let web_hits = self.search(&web_query).await;
        let news_hits = self.search(&news_query).await;

        let web_stored = self.register_hits(web_hits, "web", ticker).await;
        let news_stored = self.register_hits(news_hits, "news", ticker).await;

        let total = web_stored + news_stored;
        if total > 0 {
            vec![ok_result("ddg", "sources", total)]
        } else {
            vec![err_result("ddg", "sources", "no web or news results found")]
        }
    }
}
