use intel_core::ConnectorType;
use intel_core::IntelResult;
use intel_core::Source;
use intel_repository::Repository;

/// Registers Google News RSS and the Yahoo Finance quote page/RSS as
/// `Source` rows for the ingestion worker to poll. Separate from the
/// `Provider` trait: no rate budget, no `ProviderResult`, just `Source`s.
/// Returns the rows actually stored, so callers that need to dispatch
/// ingestion jobs (not just count discoveries) have the source ids.
pub async fn discover_query_sources(repo: &dyn Repository, ticker: &str, name: &str) -> IntelResult<Vec<Source>> {
    let mut stored = Vec::with_capacity(3);

    let news_query: String = url::form_urlencoded::byte_serialize(format!("{name} {ticker} stock").as_bytes()).collect();
    let google_news_url = format!("https://news.google.com/rss/search?q={news_query}&hl=en-US&gl=US&ceid=US:en");
    if let Ok(source) = repo.add_source(&format!("Google News RSS ({ticker})"), &google_news_url, ConnectorType::Rss).await {
        stored.push(source);
    }

    let yahoo_quote_url = format!("https://finance.yahoo.com/quote/{ticker}");
    if let Ok(source) = repo.add_source(&format!("Yahoo Finance Quote ({ticker})"), &yahoo_quote_url, ConnectorType::Web).await {
        stored.push(source);
    }

    let yahoo_rss_url = format!("https://feeds.finance.yahoo.com/rss/2.0/headline?s={ticker}&region=US&lang=en-US");
    if let Ok(source) = repo.add_source(&format!("Yahoo Finance RSS ({ticker})"), &yahoo_rss_url, ConnectorType::Rss).await {
        stored.push(source);
    }

    Ok(stored)
}

#[cfg(test)]
mod tests {
    #[test]
    fn form_encodes_spaces_as_plus() {
        let encoded: String = url::form_urlencoded::byte_serialize(b"Apple Inc AAPL").collect();
        assert_eq!(encoded, "Apple+Inc+AAPL");
    }
}
