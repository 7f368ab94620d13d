//! HTTP surface of the query-serving process.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `{prefix}/health` | Liveness |
//! | `POST` | `{prefix}/_internal/refresh-mapping` | Forced refresh, token guarded |
//! | `GET` | `{prefix}/models/:reference/rows` | Paged rows of a mapped class |

pub mod health;
pub mod internal;
pub mod models;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_derive::Serialize;
use std::sync::Arc;

use crate::error::Error;
use crate::mapping::AutoMap;
use crate::notify::REFRESH_PATH;
use crate::settings::{normalize_api_prefix, Settings};

#[derive(Clone)]
pub struct AppState {
    pub automap: Arc<AutoMap>,
    pub settings: Arc<Settings>,
}

pub fn router(state: AppState) -> Router {
    let prefix = normalize_api_prefix(&state.settings.api_prefix);

    let api = Router::new()
        .route("/health", get(health::health))
        .route(REFRESH_PATH, post(internal::refresh_mapping))
        .route("/models/:reference/rows", get(models::list_rows))
        .with_state(state);

    if prefix.is_empty() {
        api
    } else {
        Router::new().nest(&prefix, api)
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    detail: String,
}

pub(crate) fn error_response(status: StatusCode, detail: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            detail: detail.into(),
        }),
    )
        .into_response()
}

pub(crate) fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::NotInitialized => StatusCode::SERVICE_UNAVAILABLE,
        Error::ModelNotFound(_) | Error::TableNotMapped(_) => StatusCode::NOT_FOUND,
        Error::AmbiguousModel { .. } => StatusCode::CONFLICT,
        Error::InvalidPage(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
