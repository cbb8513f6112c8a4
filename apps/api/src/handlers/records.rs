use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use serde_json::Value;

use fincontrol_application::EntityListQuery;
use fincontrol_core::{AppError, UserIdentity};

use crate::dto::{
    BatchCountResponse, BulkCreateRecordsRequest, BulkDeleteRecordsRequest,
    BulkUpdateRecordsRequest, RecordDataRequest,
};
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, serde::Deserialize)]
pub struct RecordListParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    /// JSON-encoded exact-match filter object.
    pub filter: Option<String>,
}

pub async fn list_records_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(entity): Path<String>,
    Query(params): Query<RecordListParams>,
) -> ApiResult<Json<Vec<Value>>> {
    let filter = params
        .filter
        .as_deref()
        .map(serde_json::from_str::<Value>)
        .transpose()
        .map_err(|error| AppError::Validation(format!("invalid filter parameter: {error}")))?;

    let records = state
        .record_service
        .list_records(
            &user,
            entity.as_str(),
            EntityListQuery {
                limit: params.limit.unwrap_or(50),
                offset: params.offset.unwrap_or(0),
                filter,
            },
        )
        .await?;

    Ok(Json(records))
}

pub async fn create_record_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(entity): Path<String>,
    Json(payload): Json<RecordDataRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let record = state
        .record_service
        .create_record(&user, entity.as_str(), payload.data)
        .await?;

    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn get_record_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path((entity, record_id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let record = state
        .record_service
        .get_record(&user, entity.as_str(), record_id.as_str())
        .await?;

    Ok(Json(record))
}

pub async fn update_record_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path((entity, record_id)): Path<(String, String)>,
    Json(payload): Json<RecordDataRequest>,
) -> ApiResult<Json<Value>> {
    let record = state
        .record_service
        .update_record(&user, entity.as_str(), record_id.as_str(), payload.data)
        .await?;

    Ok(Json(record))
}

pub async fn save_record_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path((entity, record_id)): Path<(String, String)>,
    Json(payload): Json<RecordDataRequest>,
) -> ApiResult<Json<Value>> {
    let record = state
        .record_service
        .save_record(&user, entity.as_str(), record_id.as_str(), payload.data)
        .await?;

    Ok(Json(record))
}

pub async fn delete_record_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path((entity, record_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    state
        .record_service
        .delete_record(&user, entity.as_str(), record_id.as_str())
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn soft_delete_record_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path((entity, record_id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let record = state
        .record_service
        .soft_delete_record(&user, entity.as_str(), record_id.as_str())
        .await?;

    Ok(Json(record))
}

pub async fn bulk_create_records_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(entity): Path<String>,
    Json(payload): Json<BulkCreateRecordsRequest>,
) -> ApiResult<(StatusCode, Json<BatchCountResponse>)> {
    let count = state
        .record_service
        .create_records(&user, entity.as_str(), payload.rows)
        .await?;

    Ok((StatusCode::CREATED, Json(BatchCountResponse::from(count))))
}

pub async fn bulk_update_records_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(entity): Path<String>,
    Json(payload): Json<BulkUpdateRecordsRequest>,
) -> ApiResult<Json<BatchCountResponse>> {
    let count = state
        .record_service
        .update_records(&user, entity.as_str(), payload.filter, payload.data)
        .await?;

    Ok(Json(BatchCountResponse::from(count)))
}

pub async fn bulk_delete_records_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(entity): Path<String>,
    Json(payload): Json<BulkDeleteRecordsRequest>,
) -> ApiResult<Json<BatchCountResponse>> {
    let count = state
        .record_service
        .delete_records(&user, entity.as_str(), payload.filter)
        .await?;

    Ok(Json(BatchCountResponse::from(count)))
}
