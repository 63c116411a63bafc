use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use intel_core::{Entity, EntityType};
use intel_orchestrator::run_stream;
use intel_repository::LookupKey;
use serde::{Deserialize, Serialize};

use crate::{AppError, AppState, ApiResponse};

const DEFAULT_LIMIT: i64 = 12;
const MAX_LIMIT: i64 = 50;
const DEFAULT_AUTOCOMPLETE_LIMIT: i64 = 10;
const DEFAULT_HISTORY_PAGE_SIZE: i64 = 20;

#[derive(Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct AutocompleteQuery {
    pub q: String,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct AutocompleteResult {
    pub ticker: String,
    pub name: String,
    pub exchange: Option<String>,
    #[serde(rename = "type")]
    pub symbol_type: EntityType,
}

impl From<Entity> for AutocompleteResult {
    fn from(entity: Entity) -> Self {
        Self { ticker: entity.ticker, name: entity.name, exchange: entity.exchange, symbol_type: entity.entity_type }
    }
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub page_size: Option<i64>,
}

pub fn search_routes() -> Router<AppState> {
    Router::new()
        .route("/search/query", post(search_query))
        .route("/search/stream", post(search_stream))
        .route("/search/autocomplete", get(search_autocomplete))
        .route("/search/history", get(search_history))
}

async fn search_query(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<ApiResponse<intel_core::Report>>, AppError> {
    let limit = request.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let report = state.orchestrator.run(&request.query, limit).await?;
    Ok(Json(ApiResponse::success(report)))
}

async fn search_stream(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let limit = request.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let events = run_stream(state.orchestrator.clone(), request.query, limit);
    let sse_stream = events.map(|event| {
        let payload = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
        Ok(Event::default().event(event.stage.clone()).data(payload))
    });
    Sse::new(sse_stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

async fn search_autocomplete(
    State(state): State<AppState>,
    Query(query): Query<AutocompleteQuery>,
) -> Result<Json<ApiResponse<Vec<AutocompleteResult>>>, AppError> {
    let prefix = query.q.trim();
    if prefix.is_empty() {
        return Ok(Json(ApiResponse::success(Vec::new())));
    }
    let limit = query.limit.unwrap_or(DEFAULT_AUTOCOMPLETE_LIMIT).clamp(1, 25);

    if let Ok(Some(exact)) = state.repo.lookup_entity(LookupKey::Ticker(prefix)).await {
        let exact_ticker = exact.ticker.clone();
        let mut results = vec![AutocompleteResult::from(exact)];
        let matches = state.repo.autocomplete_entities(prefix, limit).await?;
        results.extend(matches.into_iter().filter(|e| e.ticker != exact_ticker).map(AutocompleteResult::from));
        return Ok(Json(ApiResponse::success(results)));
    }

    let matches = state.repo.autocomplete_entities(prefix, limit).await?;
    let results = matches.into_iter().map(AutocompleteResult::from).collect();
    Ok(Json(ApiResponse::success(results)))
}

async fn search_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<Vec<intel_core::SearchQuery>>>, AppError> {
    let page = query.page.unwrap_or(1);
    let page_size = query.page_size.unwrap_or(DEFAULT_HISTORY_PAGE_SIZE);
    let results = state.repo.recent_search_results(page, page_size).await?;
    Ok(Json(ApiResponse::success(results)))
}
