use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_derive::Deserialize;

use super::{error_response, status_for, AppState};
use crate::error::Result;
use crate::query::{fetch_page, Page};

#[derive(Debug, Deserialize)]
pub struct PageParams {
    limit: Option<u64>,
    offset: Option<u64>,
}

/// `GET /models/:reference/rows`: `reference` is `ModelName` or `app_label.ModelName`.
pub async fn list_rows(
    State(state): State<AppState>,
    Path(reference): Path<String>,
    Query(params): Query<PageParams>,
) -> Response {
    match rows(&state, &reference, params).await {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => {
            let status = status_for(&e);
            if status.is_server_error() {
                tracing::error!(error = %e, %reference, "reading rows failed");
            }
            error_response(status, e.to_string())
        }
    }
}

async fn rows(
    state: &AppState,
    reference: &str,
    params: PageParams,
) -> Result<Vec<serde_json::Map<String, serde_json::Value>>> {
    let page = Page::new(params.limit, params.offset)?;
    let class = state.automap.resolve(reference)?;
    fetch_page(state.automap.pool(), &class, page).await
}
