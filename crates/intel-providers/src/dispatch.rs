//! Fans a resolved entity out to every configured provider, isolating
//! per-provider failures, then registers RSS/web discovery sources and
//! recomputes coverage. Mirrors `run_full_enrichment` in shape.

use std::sync::Arc;
use std::time::Duration;

use intel_core::{Entity, EntityCoverage, ProviderResult, Settings};
use intel_repository::Repository;
use reqwest::Client;
use tracing::{info, warn};

use crate::{
    discover_query_sources, AlphaVantageProvider, CboeProvider, DdgProvider, FinraProvider,
    FinvizProvider, FmpProvider, FredProvider, PolygonProvider, Provider, RedditProvider,
    SecEdgarProvider,
};

pub struct EnrichmentSummary {
    pub entity: Entity,
    pub providers_run: Vec<ProviderResult>,
    pub total_records: i64,
    pub rss_sources_discovered: i64,
    pub coverage: EntityCoverage,
}

/// Providers built once per dispatch call, each configured from `Settings`
/// and sharing the one repository handle. `rate_limit_ok()` is consulted by
/// dispatch, not by the providers' own `fetch_company_data` (they no-op
/// when their own budget is exhausted, but dispatch skips the call
/// entirely to avoid an extra network round trip on FRED/SEC, which have
/// no budget).
pub struct ProviderRegistry {
    providers: Vec<Box<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn build(settings: &Settings, repo: Arc<dyn Repository>) -> Self {
        let providers: Vec<Box<dyn Provider>> = vec![
            Box::new(SecEdgarProvider::new(settings.sec_edgar_user_agent.clone(), repo.clone())),
            Box::new(FmpProvider::new(settings.fmp_api_key.clone(), repo.clone())),
            Box::new(AlphaVantageProvider::new(settings.alpha_vantage_api_key.clone(), repo.clone())),
            Box::new(PolygonProvider::new(settings.polygon_api_key.clone(), repo.clone())),
            Box::new(FredProvider::new(settings.fred_api_key.clone(), repo.clone())),
            Box::new(RedditProvider::new(repo.clone())),
            Box::new(DdgProvider::new(repo.clone())),
            Box::new(FinvizProvider::new(repo.clone())),
            Box::new(FinraProvider::new(repo.clone())),
            Box::new(CboeProvider::new(repo.clone())),
        ];
        Self { providers }
    }
}

/// Runs every configured provider against `entity`, isolating failures,
/// discovers RSS/web sources, then recomputes coverage. `fmp` is passed
/// separately since the real-time snapshot path (enrichment/C7) also needs
/// direct access to its gap-fill endpoints outside this dispatch.
pub async fn run_full_enrichment(
    repo: &dyn Repository,
    registry: &ProviderRegistry,
    entity: &Entity,
) -> intel_core::IntelResult<EnrichmentSummary> {
    let mut providers_run = Vec::new();

    for provider in &registry.providers {
        if !provider.is_configured() {
            continue;
        }
        if !provider.rate_limit_ok() {
            warn!(provider = provider.name(), "daily budget exhausted, skipping");
            continue;
        }
        info!(provider = provider.name(), ticker = %entity.ticker, "running provider");
        let results = provider.fetch_company_data(entity).await;
        providers_run.extend(results);
    }

    let rss_sources_discovered = discover_query_sources(repo, &entity.ticker, &entity.name)
        .await
        .map(|sources| sources.len() as i64)
        .unwrap_or(0);

    let coverage = repo.update_coverage(entity.id, &entity.ticker).await?;

    let total_records = providers_run.iter().map(|r| r.records_stored).sum();

    Ok(EnrichmentSummary {
        entity: entity.clone(),
        providers_run,
        total_records,
        rss_sources_discovered,
        coverage,
    })
}

/// Builds a short-lived HTTP client shared by discovery callers that don't
/// otherwise need a `ProviderRegistry` (e.g. autocomplete previews).
pub fn discovery_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_else(|_| Client::new())
}
