use fincontrol_application::{AuditLogEntry, BatchCount};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Health response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub audit_enabled: bool,
    pub postgres: HealthDependencyStatus,
}

/// Result of probing one backing service.
#[derive(Debug, Serialize)]
pub struct HealthDependencyStatus {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Incoming payload for single-row writes.
#[derive(Debug, Deserialize)]
pub struct RecordDataRequest {
    pub data: Value,
}

/// Incoming payload for bulk inserts.
#[derive(Debug, Deserialize)]
pub struct BulkCreateRecordsRequest {
    pub rows: Vec<Value>,
}

/// Incoming payload for bulk updates.
#[derive(Debug, Deserialize)]
pub struct BulkUpdateRecordsRequest {
    pub filter: Value,
    pub data: Value,
}

/// Incoming payload for bulk deletes.
#[derive(Debug, Deserialize)]
pub struct BulkDeleteRecordsRequest {
    pub filter: Value,
}

/// Affected row count of a bulk operation.
#[derive(Debug, Serialize)]
pub struct BatchCountResponse {
    pub count: u64,
}

impl From<BatchCount> for BatchCountResponse {
    fn from(value: BatchCount) -> Self {
        Self { count: value.count }
    }
}

/// API representation of one audit record.
#[derive(Debug, Serialize)]
pub struct AuditRecordResponse {
    pub id: String,
    pub entity: String,
    pub entity_id: String,
    pub action: String,
    pub actor_id: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub diff: Option<Value>,
    pub at: String,
}

impl From<AuditLogEntry> for AuditRecordResponse {
    fn from(value: AuditLogEntry) -> Self {
        Self {
            id: value.record_id,
            entity: value.entity,
            entity_id: value.entity_id,
            action: value.action.to_string(),
            actor_id: value.actor_id,
            ip: value.ip,
            user_agent: value.user_agent,
            diff: value.diff,
            at: value.at,
        }
    }
}
