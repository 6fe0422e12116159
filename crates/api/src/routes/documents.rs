use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use draftline_core::document::model::{DocumentVersion, Status};
use draftline_core::mutation::types::{
    CreateParams, DeleteParams, DeleteResult, FindManyParams, FindOneParams, LocaleParams,
    MetadataParams, UpdateParams,
};
use draftline_core::service::Documents;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/documents/{uid}", get(list).post(create))
        .route(
            "/v1/documents/{uid}/{document_id}",
            get(find_one).put(update).delete(remove),
        )
        .route(
            "/v1/documents/{uid}/{document_id}/actions/{action}",
            post(action),
        )
        .route(
            "/v1/documents/{uid}/{document_id}/metadata",
            get(metadata),
        )
}

#[derive(Debug, Serialize)]
struct DataResponse<T> {
    data: T,
}

/// Query string of a single-document read. `fields` is comma separated.
#[derive(Debug, Default, Deserialize)]
struct FindQuery {
    locale: Option<String>,
    status: Option<Status>,
    fields: Option<String>,
}

impl From<FindQuery> for FindOneParams {
    fn from(query: FindQuery) -> Self {
        FindOneParams {
            locale: query.locale,
            status: query.status,
            fields: query.fields.map(|fields| {
                fields
                    .split(',')
                    .map(str::trim)
                    .filter(|f| !f.is_empty())
                    .map(str::to_string)
                    .collect()
            }),
        }
    }
}

fn sanitized(
    state: &AppState,
    documents: &Documents<'_>,
    version: DocumentVersion,
) -> ApiResult<DocumentVersion> {
    let schema = documents.schema()?;
    Ok(state.output().apply_version(&schema, version)?)
}

fn found(
    state: &AppState,
    documents: &Documents<'_>,
    document_id: &str,
    version: Option<DocumentVersion>,
) -> ApiResult<Json<DataResponse<DocumentVersion>>> {
    match version {
        Some(version) => Ok(Json(DataResponse {
            data: sanitized(state, documents, version)?,
        })),
        None => Err(ApiError::NotFound(format!(
            "document {document_id} not found"
        ))),
    }
}

async fn list(
    State(state): State<AppState>,
    Path(uid): Path<String>,
    Query(params): Query<FindManyParams>,
) -> ApiResult<Json<DataResponse<Vec<DocumentVersion>>>> {
    let documents = state.service().documents(&uid);
    let rows = documents.find_many(params).await?;
    let data = rows
        .into_iter()
        .map(|row| sanitized(&state, &documents, row))
        .collect::<ApiResult<Vec<_>>>()?;
    Ok(Json(DataResponse { data }))
}

async fn create(
    State(state): State<AppState>,
    Path(uid): Path<String>,
    Json(params): Json<CreateParams>,
) -> ApiResult<(StatusCode, Json<DataResponse<DocumentVersion>>)> {
    let documents = state.service().documents(&uid);
    let created = documents.create(params).await?;
    let data = sanitized(&state, &documents, created)?;
    Ok((StatusCode::CREATED, Json(DataResponse { data })))
}

/// `{ data, meta }`: the row plus its locale and status availability.
async fn find_one(
    State(state): State<AppState>,
    Path((uid, document_id)): Path<(String, String)>,
    Query(query): Query<FindQuery>,
) -> ApiResult<Json<Value>> {
    let documents = state.service().documents(&uid);
    let params = FindOneParams::from(query);
    let meta_params = MetadataParams {
        locale: params.locale.clone(),
        status: params.status,
    };

    let Some(version) = documents.find_one(&document_id, params).await? else {
        return Err(ApiError::NotFound(format!("document {document_id} not found")));
    };
    let meta = documents.get_metadata(&document_id, meta_params).await?;
    let data = sanitized(&state, &documents, version)?;
    Ok(Json(json!({ "data": data, "meta": meta })))
}

async fn update(
    State(state): State<AppState>,
    Path((uid, document_id)): Path<(String, String)>,
    Json(params): Json<UpdateParams>,
) -> ApiResult<Json<DataResponse<DocumentVersion>>> {
    let documents = state.service().documents(&uid);
    let updated = documents.update(&document_id, params).await?;
    found(&state, &documents, &document_id, updated)
}

async fn remove(
    State(state): State<AppState>,
    Path((uid, document_id)): Path<(String, String)>,
    Query(params): Query<DeleteParams>,
) -> ApiResult<Json<DataResponse<DeleteResult>>> {
    let result = state
        .service()
        .documents(&uid)
        .delete(&document_id, params)
        .await?;
    Ok(Json(DataResponse { data: result }))
}

async fn action(
    State(state): State<AppState>,
    Path((uid, document_id, action)): Path<(String, String, String)>,
    Query(params): Query<LocaleParams>,
) -> ApiResult<Json<DataResponse<DocumentVersion>>> {
    let documents = state.service().documents(&uid);
    let result = match action.as_str() {
        "publish" => documents.publish(&document_id, params).await?,
        "unpublish" => documents.unpublish(&document_id, params).await?,
        "discard" => documents.discard_draft(&document_id, params).await?,
        other => return Err(ApiError::BadRequest(format!("unknown action {other}"))),
    };
    found(&state, &documents, &document_id, result)
}

async fn metadata(
    State(state): State<AppState>,
    Path((uid, document_id)): Path<(String, String)>,
    Query(params): Query<MetadataParams>,
) -> ApiResult<Json<Value>> {
    let meta = state
        .service()
        .documents(&uid)
        .get_metadata(&document_id, params)
        .await?;
    Ok(Json(json!({ "meta": meta })))
}
