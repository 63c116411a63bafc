//! Free-text query -> canonical `Entity` resolution (C2).
//!
//! Resolution order follows the cache-first, external-enrichment-second
//! shape: repository cache, symbol search, CIK lookup, profile enrichment,
//! upsert. Every external step degrades to `None`/empty rather than erroring
//! the whole resolution — only a dead-end symbol search yields `Ok(None)`.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use intel_core::{Entity, EntityType, IntelResult, Settings};
use intel_repository::{EntityUpsert, LookupKey, Repository};
use reqwest::Client;
use serde::Deserialize;

const YAHOO_SEARCH_URL: &str = "https://query2.finance.yahoo.com/v1/finance/search";
const SEC_TICKERS_URL: &str = "https://www.sec.gov/files/company_tickers.json";

#[derive(Debug, Clone)]
struct YahooHit {
    ticker: String,
    name: String,
    exchange: String,
    entity_type: EntityType,
}

#[derive(Debug, Clone)]
pub struct AutocompleteSuggestion {
    pub ticker: String,
    pub name: String,
    pub exchange: String,
    pub entity_type: EntityType,
}

pub struct EntityResolver {
    repo: Arc<dyn Repository>,
    client: Client,
    settings: Arc<Settings>,
}

impl EntityResolver {
    pub fn new(repo: Arc<dyn Repository>, settings: Arc<Settings>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("Mozilla/5.0")
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            repo,
            client,
            settings,
        }
    }

    /// Resolution order: cache (ticker/name/alias), symbol search, CIK
    /// lookup, profile enrichment, upsert. See §4.2.
    pub async fn resolve_entity(
        &self,
        query_text: &str,
        pre_resolved_ticker: Option<&str>,
    ) -> IntelResult<Option<Entity>> {
        if let Some(ticker) = pre_resolved_ticker {
            if let Some(existing) = self.repo.lookup_entity(LookupKey::Ticker(ticker)).await? {
                return Ok(Some(existing));
            }
        }

        if let Some(existing) = self.lookup_cached(query_text).await? {
            return Ok(Some(existing));
        }

        let (ticker, yahoo) = match pre_resolved_ticker {
            Some(t) => (t.to_string(), None),
            None => match self.resolve_via_yahoo(query_text).await {
                Some(hit) if !hit.ticker.is_empty() => {
                    let ticker = hit.ticker.clone();
                    (ticker, Some(hit))
                }
                _ => return Ok(None),
            },
        };

        if let Some(existing) = self.repo.lookup_entity(LookupKey::Ticker(&ticker)).await? {
            return Ok(Some(existing));
        }

        let cik = self.resolve_cik_from_sec(&ticker).await;
        let profile = self.enrich_from_fmp(&ticker).await;

        let mut aliases: BTreeSet<String> = BTreeSet::new();
        aliases.insert(query_text.trim().to_lowercase());
        aliases.insert(ticker.to_lowercase());
        if let Some(hit) = &yahoo {
            if !hit.name.is_empty() {
                aliases.insert(hit.name.to_lowercase());
            }
        }

        let final_name = profile
            .as_ref()
            .and_then(|p| p.name.clone())
            .or_else(|| yahoo.as_ref().map(|h| h.name.clone()))
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| query_text.trim().to_string());

        let entity = self
            .repo
            .upsert_entity(EntityUpsert {
                name: final_name,
                ticker,
                cik,
                sector: profile.as_ref().and_then(|p| p.sector.clone()),
                industry: profile.as_ref().and_then(|p| p.industry.clone()),
                exchange: yahoo.as_ref().map(|h| h.exchange.clone()),
                aliases: aliases.into_iter().collect(),
            })
            .await?;

        Ok(Some(entity))
    }

    async fn lookup_cached(&self, query_text: &str) -> IntelResult<Option<Entity>> {
        let trimmed = query_text.trim();
        if let Some(e) = self.repo.lookup_entity(LookupKey::Ticker(trimmed)).await? {
            return Ok(Some(e));
        }
        if let Some(e) = self.repo.lookup_entity(LookupKey::Name(trimmed)).await? {
            return Ok(Some(e));
        }
        self.repo
            .lookup_entity(LookupKey::Alias(&trimmed.to_lowercase()))
            .await
    }

    /// Symbol search against the Yahoo Finance quotes API. Query attempts,
    /// in order: explicit `(TICKER)` parenthetical, the full query text,
    /// then the first token for multi-word queries. First EQUITY/ETF quote
    /// wins; falls back to the first quote of any type.
    async fn resolve_via_yahoo(&self, query_text: &str) -> Option<YahooHit> {
        let query_clean = query_text.trim();
        let mut attempts = Vec::new();

        if let Some(explicit) = extract_parenthetical_ticker(query_clean) {
            attempts.push(explicit.to_uppercase());
        }
        attempts.push(query_clean.to_string());
        let tokens: Vec<&str> = query_clean.split_whitespace().collect();
        if tokens.len() > 1 {
            attempts.push(tokens[0].to_string());
        }

        let mut seen = BTreeSet::new();
        for attempt in attempts {
            if !seen.insert(attempt.clone()) {
                continue;
            }
            if let Some(hit) = self.yahoo_search_once(&attempt).await {
                return Some(hit);
            }
        }
        None
    }

    async fn yahoo_search_once(&self, query: &str) -> Option<YahooHit> {
        let resp = self
            .client
            .get(YAHOO_SEARCH_URL)
            .query(&[("q", query), ("quotesCount", "3"), ("newsCount", "0")])
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let body: YahooSearchResponse = resp.json().await.ok()?;
        let quotes = body.quotes;
        if quotes.is_empty() {
            return None;
        }

        for q in &quotes {
            let qtype = q.quote_type.to_uppercase();
            if qtype == "EQUITY" || qtype == "ETF" {
                return Some(YahooHit {
                    ticker: q.symbol.clone(),
                    name: q.shortname.clone().or_else(|| q.longname.clone()).unwrap_or_default(),
                    exchange: q.exchange.clone().unwrap_or_default(),
                    entity_type: if qtype == "ETF" {
                        EntityType::Etf
                    } else {
                        EntityType::Company
                    },
                });
            }
        }

        let q = &quotes[0];
        Some(YahooHit {
            ticker: q.symbol.clone(),
            name: q.shortname.clone().or_else(|| q.longname.clone()).unwrap_or_default(),
            exchange: q.exchange.clone().unwrap_or_default(),
            entity_type: EntityType::Company,
        })
    }

    async fn resolve_cik_from_sec(&self, ticker: &str) -> Option<String> {
        let resp = self
            .client
            .get(SEC_TICKERS_URL)
            .header("User-Agent", self.settings.sec_edgar_user_agent.clone())
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let body: serde_json::Value = resp.json().await.ok()?;
        let ticker_upper = ticker.to_uppercase();
        let entries = body.as_object()?;
        for entry in entries.values() {
            let entry_ticker = entry.get("ticker")?.as_str().unwrap_or_default().to_uppercase();
            if entry_ticker == ticker_upper {
                let cik = entry.get("cik_str")?.as_i64()?;
                return Some(format!("{cik:0>10}"));
            }
        }
        None
    }

    async fn enrich_from_fmp(&self, ticker: &str) -> Option<FmpProfile> {
        let api_key = self.settings.fmp_api_key.clone();
        if api_key.is_empty() {
            return None;
        }
        let url = format!("https://financialmodelingprep.com/api/v3/profile/{ticker}");
        let resp = self
            .client
            .get(&url)
            .query(&[("apikey", &api_key)])
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let data: Vec<serde_json::Value> = resp.json().await.ok()?;
        let entry = data.first()?;
        Some(FmpProfile {
            sector: entry.get("sector").and_then(|v| v.as_str()).map(str::to_string),
            industry: entry.get("industry").and_then(|v| v.as_str()).map(str::to_string),
            name: entry.get("companyName").and_then(|v| v.as_str()).map(str::to_string),
        })
    }

    /// Up to `limit` suggestions ordered exact-ticker > ticker-prefix >
    /// name-substring > alias, DB rows first, quotes API second.
    pub async fn autocomplete(&self, query: &str, limit: i64) -> IntelResult<Vec<AutocompleteSuggestion>> {
        let mut suggestions = Vec::new();
        let mut seen_tickers = BTreeSet::new();

        for entity in self.repo.autocomplete_entities(query, limit).await? {
            if seen_tickers.insert(entity.ticker.clone()) {
                suggestions.push(AutocompleteSuggestion {
                    ticker: entity.ticker,
                    name: entity.name,
                    exchange: entity.exchange.unwrap_or_default(),
                    entity_type: entity.entity_type,
                });
            }
        }

        if (suggestions.len() as i64) < limit {
            if let Ok(resp) = self
                .client
                .get(YAHOO_SEARCH_URL)
                .query(&[
                    ("q", query),
                    ("quotesCount", &limit.to_string()),
                    ("newsCount", "0"),
                ])
                .send()
                .await
            {
                if resp.status().is_success() {
                    if let Ok(body) = resp.json::<YahooSearchResponse>().await {
                        for q in body.quotes {
                            let qtype = q.quote_type.to_uppercase();
                            if qtype != "EQUITY" && qtype != "ETF" {
                                continue;
                            }
                            if q.symbol.is_empty() || !seen_tickers.insert(q.symbol.clone()) {
                                continue;
                            }
                            suggestions.push(AutocompleteSuggestion {
                                ticker: q.symbol,
                                name: q.shortname.or(q.longname).unwrap_or_default(),
                                exchange: q.exchange.unwrap_or_default(),
                                entity_type: if qtype == "ETF" {
                                    EntityType::Etf
                                } else {
                                    EntityType::Company
                                },
                            });
                            if suggestions.len() as i64 >= limit {
                                break;
                            }
                        }
                    }
                }
            }
        }

        suggestions.truncate(limit.max(0) as usize);
        Ok(suggestions)
    }
}

struct FmpProfile {
    sector: Option<String>,
    industry: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct YahooSearchResponse {
    #[serde(default)]
    quotes: Vec<YahooQuote>,
}

#[derive(Debug, Deserialize)]
struct YahooQuote {
    symbol: String,
    #[serde(rename = "quoteType", default)]
    quote_type: String,
    shortname: Option<String>,
    longname: Option<String>,
    exchange: Option<String>,
}

fn extract_parenthetical_ticker(query: &str) -> Option<&str> {
    let start = query.find('(')?;
    let end = query[start..].find(')')? + start;
    let inner = &query[start + 1..end];
    if !inner.is_empty()
        && inner
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        Some(inner)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_explicit_ticker_in_parentheses() {
        assert_eq!(extract_parenthetical_ticker("Tata Motors (TMCV.NS)"), Some("TMCV.NS"));
        assert_eq!(extract_parenthetical_ticker("no ticker here"), None);
    }

    #[test]
    fn ignores_parentheses_with_non_ticker_content() {
        assert_eq!(extract_parenthetical_ticker("a company (formerly known as X Y)"), None);
    }
}
