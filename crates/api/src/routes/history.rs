use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use draftline_core::document::model::{DocumentVersion, HistoryVersion};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/history/{uid}/{document_id}", get(find_versions))
        .route(
            "/v1/history/{uid}/versions/{version_id}/restore",
            post(restore),
        )
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    locale: Option<String>,
    limit: Option<usize>,
    #[serde(default)]
    offset: usize,
}

async fn find_versions(
    State(state): State<AppState>,
    Path((uid, document_id)): Path<(String, String)>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Json<Value>> {
    let versions = state
        .service()
        .history(&uid)
        .find_versions(
            &document_id,
            params.locale.as_deref(),
            params.limit,
            params.offset,
        )
        .await?;
    let schema = state.service().documents(&uid).schema()?;
    let versions = versions
        .into_iter()
        .map(|mut version| {
            version.data = state.output().apply_value(&schema, version.data)?;
            Ok(version)
        })
        .collect::<ApiResult<Vec<HistoryVersion>>>()?;
    Ok(Json(json!({ "data": versions })))
}

async fn restore(
    State(state): State<AppState>,
    Path((uid, version_id)): Path<(String, i64)>,
) -> ApiResult<Json<Value>> {
    let restored: Option<DocumentVersion> =
        state.service().history(&uid).restore(version_id).await?;
    let Some(restored) = restored else {
        return Err(ApiError::NotFound(format!(
            "history version {version_id} not found"
        )));
    };
    let schema = state.service().documents(&uid).schema()?;
    let data = state.output().apply_version(&schema, restored)?;
    Ok(Json(json!({ "data": data })))
}
