pub mod auth;
pub mod search_routes;

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use intel_core::{IntelError, Settings};
use intel_orchestrator::Orchestrator;
use intel_repository::Repository;
use serde::Serialize;

/// Shared state handed to every route, mirroring the teacher's `AppState`
/// pattern (one struct of shared handles, cloned cheaply per-request).
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub repo: Arc<dyn Repository>,
    pub settings: Arc<Settings>,
}

/// Uniform JSON envelope for every response, following the
/// `{"success": ..., "data"/"error": ...}` shape used throughout the
/// teacher's route handlers.
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }
}

pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self.0, "request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::<()> { success: false, data: None, error: Some(self.0.to_string()) }),
        )
            .into_response()
    }
}

impl From<IntelError> for AppError {
    fn from(error: IntelError) -> Self {
        Self(error.into())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self(error)
    }
}

async fn health() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::success("ok"))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(search_routes::search_routes())
        .with_state(state)
}
