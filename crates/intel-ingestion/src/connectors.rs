use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use intel_core::{ConnectorType, IntelError, IntelResult};
use regex::Regex;
use reqwest::Client;

#[async_trait]
pub trait Connector: Send + Sync {
    async fn fetch(&self, source_url: &str) -> IntelResult<String>;
}

pub struct WebConnector {
    client: Client,
    user_agent: String,
}

impl WebConnector {
    pub fn new(user_agent: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(20))
                .build()
                .unwrap_or_else(|_| Client::new()),
            user_agent,
        }
    }
}

#[async_trait]
impl Connector for WebConnector {
    async fn fetch(&self, source_url: &str) -> IntelResult<String> {
        let response = self
            .client
            .get(source_url)
            .header("User-Agent", &self.user_agent)
            .send()
            .await
            .map_err(|e| IntelError::TransportFailure(e.to_string()))?;
        if !response.status().is_success() {
            return Err(IntelError::TransportFailure(format!(
                "status {}",
                response.status()
            )));
        }
        response
            .text()
            .await
            .map_err(|e| IntelError::TransportFailure(e.to_string()))
    }
}

static ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<item[^>]*>(.*?)</item>").unwrap());
static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(?:<!\[CDATA\[)?(.*?)(?:\]\]>)?</title>").unwrap());
static DESCRIPTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<description[^>]*>(?:<!\[CDATA\[)?(.*?)(?:\]\]>)?</description>").unwrap()
});
static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<link[^>]*>(.*?)</link>").unwrap());
static FEED_TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(?:<!\[CDATA\[)?(.*?)(?:\]\]>)?</title>").unwrap());

const MAX_ENTRIES: usize = 20;

pub struct RssConnector {
    client: Client,
}

impl RssConnector {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(20))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    fn extract_tag(re: &Regex, block: &str) -> String {
        re.captures(block)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default()
    }
}

impl Default for RssConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for RssConnector {
    /// No feed-parsing crate is in the dependency stack, so items are
    /// pulled out with a regex pass over each `<item>` block rather than a
    /// proper XML parse. Good enough for the plain title/summary/link shape
    /// every RSS 2.0 feed shares.
    async fn fetch(&self, source_url: &str) -> IntelResult<String> {
        let response = self
            .client
            .get(source_url)
            .send()
            .await
            .map_err(|e| IntelError::TransportFailure(e.to_string()))?;
        if !response.status().is_success() {
            return Err(IntelError::TransportFailure(format!(
                "status {}",
                response.status()
            )));
        }
        let body = response
            .text()
            .await
            .map_err(|e| IntelError::TransportFailure(e.to_string()))?;

        let entries: Vec<String> = ITEM_RE
            .captures_iter(&body)
            .take(MAX_ENTRIES)
            .map(|cap| {
                let block = cap.get(1).map(|m| m.as_str()).unwrap_or_default();
                let title = Self::extract_tag(&TITLE_RE, block);
                let summary = Self::extract_tag(&DESCRIPTION_RE, block);
                let link = Self::extract_tag(&LINK_RE, block);
                format!("title={title}\nsummary={summary}\nlink={link}")
            })
            .collect();

        if entries.is_empty() {
            let feed_title = FEED_TITLE_RE
                .captures(&body)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default();
            return Ok(format!("feed_title={feed_title}\nno_entries=true"));
        }

        Ok(entries.join("\n\n"))
    }
}

pub fn get_connector(connector_type: ConnectorType, user_agent: &str) -> Box<dyn Connector> {
    match connector_type {
        ConnectorType::Web => Box::new(WebConnector::new(user_agent.to_string())),
        ConnectorType::Rss => Box::new(RssConnector::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rss_extracts_title_summary_link_from_items() {
        let body = r#"<rss><channel>
            <item><title>Acme beats estimates</title><description>Q3 results</description><link>http://x/1</link></item>
            <item><title><![CDATA[Acme guidance cut]]></title><description>Outlook lowered</description><link>http://x/2</link></item>
        </channel></rss>"#;
        let entries: Vec<String> = ITEM_RE
            .captures_iter(body)
            .map(|cap| {
                let block = cap.get(1).unwrap().as_str();
                RssConnector::extract_tag(&TITLE_RE, block)
            })
            .collect();
        assert_eq!(entries, vec!["Acme beats estimates", "Acme guidance cut"]);
    }

    #[test]
    fn rss_reports_no_entries_when_feed_is_empty() {
        let body = "<rss><channel><title>Empty Feed</title></channel></rss>";
        assert!(ITEM_RE.captures_iter(body).next().is_none());
        let feed_title = FEED_TITLE_RE
            .captures(body)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());
        assert_eq!(feed_title, Some("Empty Feed".to_string()));
    }
}
