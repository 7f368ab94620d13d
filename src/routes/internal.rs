use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use super::{error_response, AppState};
use crate::notify::TOKEN_HEADER;

/// `POST /_internal/refresh-mapping`: forced refresh, called after migrations.
///
/// Rejects every caller when no token is configured.
pub async fn refresh_mapping(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let expected = state.settings.internal.refresh_token.as_str();
    let supplied = headers
        .get(TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if expected.is_empty() || supplied != expected {
        return error_response(StatusCode::FORBIDDEN, "Forbidden");
    }

    match state.automap.refresh(true).await {
        Ok(()) => Json(json!({ "status": "refreshed" })).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "forced mapping refresh failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}
