use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use fincontrol_application::{AuditRecord, AuditRecordStore};
use fincontrol_core::{AppError, AppResult};

/// PostgreSQL-backed append-only audit record store.
#[derive(Clone)]
pub struct PostgresAuditRecordStore {
    pool: PgPool,
}

impl PostgresAuditRecordStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRecordStore for PostgresAuditRecordStore {
    async fn insert(&self, record: AuditRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_records (
                id,
                entity,
                entity_id,
                action,
                actor_id,
                ip,
                user_agent,
                diff,
                at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(record.entity)
        .bind(record.entity_id)
        .bind(record.action.as_str())
        .bind(record.actor_id)
        .bind(record.ip)
        .bind(record.user_agent)
        .bind(record.diff)
        .bind(record.at)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to append audit record: {error}")))?;

        Ok(())
    }
}
