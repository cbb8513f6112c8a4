use axum::Json;
use axum::extract::{Extension, Query, State};

use fincontrol_application::AuditLogQuery;
use fincontrol_core::UserIdentity;
use fincontrol_domain::AuditAction;

use crate::dto::AuditRecordResponse;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, serde::Deserialize)]
pub struct AuditLogParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub entity: Option<String>,
    pub entity_id: Option<String>,
    pub action: Option<String>,
    pub actor_id: Option<String>,
}

pub async fn list_audit_log_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Query(params): Query<AuditLogParams>,
) -> ApiResult<Json<Vec<AuditRecordResponse>>> {
    let records = state
        .audit_log_service
        .list_records(
            &user,
            AuditLogQuery {
                limit: params.limit.unwrap_or(50),
                offset: params.offset.unwrap_or(0),
                entity: params.entity,
                entity_id: params.entity_id,
                action: params.action.as_deref().map(AuditAction::from_storage),
                actor_id: params.actor_id,
            },
        )
        .await?
        .into_iter()
        .map(AuditRecordResponse::from)
        .collect();

    Ok(Json(records))
}
