use async_trait::async_trait;
use serde_json::Value;
use sqlx::{FromRow, PgPool};

use fincontrol_application::{AuditLogEntry, AuditLogQuery, AuditLogRepository};
use fincontrol_core::{AppError, AppResult};
use fincontrol_domain::AuditAction;

/// PostgreSQL-backed repository for audit log read models.
#[derive(Clone)]
pub struct PostgresAuditLogRepository {
    pool: PgPool,
}

impl PostgresAuditLogRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AuditRecordRow {
    record_id: uuid::Uuid,
    entity: String,
    entity_id: String,
    action: String,
    actor_id: Option<String>,
    ip: Option<String>,
    user_agent: Option<String>,
    diff: Option<Value>,
    at: String,
}

#[async_trait]
impl AuditLogRepository for PostgresAuditLogRepository {
    async fn list_records(&self, query: AuditLogQuery) -> AppResult<Vec<AuditLogEntry>> {
        let query = query.clamped();
        let rows = sqlx::query_as::<_, AuditRecordRow>(
            r#"
            SELECT
                id AS record_id,
                entity,
                entity_id,
                action,
                actor_id,
                ip,
                user_agent,
                diff,
                to_char(at AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS at
            FROM audit_records
            WHERE ($1::TEXT IS NULL OR entity = $1)
                AND ($2::TEXT IS NULL OR entity_id = $2)
                AND ($3::TEXT IS NULL OR action = $3)
                AND ($4::TEXT IS NULL OR actor_id = $4)
            ORDER BY audit_records.at DESC, audit_records.id DESC
            LIMIT $5
            OFFSET $6
            "#,
        )
        .bind(query.entity)
        .bind(query.entity_id)
        .bind(query.action.as_ref().map(AuditAction::as_str))
        .bind(query.actor_id)
        .bind(query.limit as i64)
        .bind(query.offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list audit records: {error}")))?;

        Ok(rows
            .into_iter()
            .map(|row| AuditLogEntry {
                record_id: row.record_id.to_string(),
                entity: row.entity,
                entity_id: row.entity_id,
                action: AuditAction::from_storage(&row.action),
                actor_id: row.actor_id,
                ip: row.ip,
                user_agent: row.user_agent,
                diff: row.diff,
                at: row.at,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests;
