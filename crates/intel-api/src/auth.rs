use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::AppState;

/// Checks an `X-Write-Key` header against `Settings::api_write_key`. No
/// route in this crate is mutating, so nothing is wired to this middleware
/// today; it exists as the seam a future write endpoint (ingest trigger,
/// retention override) would attach to, mirroring the teacher's layered
/// `auth_middleware`/`live_trading_auth_middleware` split between read and
/// write surfaces.
#[allow(dead_code)]
pub async fn require_write_key(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, WriteKeyError> {
    let provided = headers.get("x-write-key").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided.is_empty() {
        return Err(WriteKeyError::Missing);
    }
    if provided != state.settings.api_write_key {
        return Err(WriteKeyError::Invalid);
    }
    Ok(next.run(request).await)
}

#[derive(Debug)]
pub enum WriteKeyError {
    Missing,
    Invalid,
}

impl IntoResponse for WriteKeyError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            WriteKeyError::Missing => (StatusCode::UNAUTHORIZED, "missing X-Write-Key header"),
            WriteKeyError::Invalid => (StatusCode::FORBIDDEN, "invalid write key"),
        };
        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}
