use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Postgres, Transaction};

use fincontrol_application::{BatchCount, EntityListQuery, EntityRepository};
use fincontrol_core::{AppError, AppResult};

use crate::entity_rows::{data_fields, filter_fields, prepare_insert};

/// PostgreSQL-backed entity repository storing rows as JSONB documents.
///
/// Filters are matched with JSONB containment, so every filter field must
/// equal the stored field.
#[derive(Clone)]
pub struct PostgresEntityRepository {
    pool: PgPool,
}

impl PostgresEntityRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn not_found(entity: &str, filter: &Value) -> AppError {
    AppError::NotFound(format!("no {entity} row matches {filter}"))
}

fn map_write_error(entity: &str, id: &str, error: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("23505")
    {
        return AppError::Conflict(format!("{entity} '{id}' already exists"));
    }

    AppError::Internal(format!("failed to insert {entity} '{id}': {error}"))
}

async fn insert_row(
    transaction: &mut Transaction<'_, Postgres>,
    entity: &str,
    data: Value,
) -> AppResult<Value> {
    let (id, row) = prepare_insert(data)?;

    sqlx::query_scalar::<_, Value>(
        r#"
        INSERT INTO entity_records (entity, id, data)
        VALUES ($1, $2, $3)
        RETURNING data
        "#,
    )
    .bind(entity)
    .bind(id.as_str())
    .bind(row)
    .fetch_one(&mut **transaction)
    .await
    .map_err(|error| map_write_error(entity, id.as_str(), error))
}

async fn begin(pool: &PgPool) -> AppResult<Transaction<'static, Postgres>> {
    pool.begin()
        .await
        .map_err(|error| AppError::Internal(format!("failed to start transaction: {error}")))
}

async fn commit(transaction: Transaction<'_, Postgres>) -> AppResult<()> {
    transaction
        .commit()
        .await
        .map_err(|error| AppError::Internal(format!("failed to commit transaction: {error}")))
}

#[async_trait]
impl EntityRepository for PostgresEntityRepository {
    async fn find_unique(&self, entity: &str, filter: &Value) -> AppResult<Option<Value>> {
        filter_fields(filter)?;

        sqlx::query_scalar::<_, Value>(
            r#"
            SELECT data
            FROM entity_records
            WHERE entity = $1 AND data @> $2
            ORDER BY created_at, id
            LIMIT 1
            "#,
        )
        .bind(entity)
        .bind(filter)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find {entity} row: {error}")))
    }

    async fn find_many(&self, entity: &str, query: EntityListQuery) -> AppResult<Vec<Value>> {
        let query = query.clamped();
        if let Some(filter) = &query.filter {
            filter_fields(filter)?;
        }

        sqlx::query_scalar::<_, Value>(
            r#"
            SELECT data
            FROM entity_records
            WHERE entity = $1 AND ($2::JSONB IS NULL OR data @> $2)
            ORDER BY created_at, id
            LIMIT $3
            OFFSET $4
            "#,
        )
        .bind(entity)
        .bind(query.filter)
        .bind(query.limit as i64)
        .bind(query.offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list {entity} rows: {error}")))
    }

    async fn create(&self, entity: &str, data: Value) -> AppResult<Value> {
        let mut transaction = begin(&self.pool).await?;
        let row = insert_row(&mut transaction, entity, data).await?;
        commit(transaction).await?;

        Ok(row)
    }

    async fn update(&self, entity: &str, filter: &Value, data: Value) -> AppResult<Value> {
        filter_fields(filter)?;
        let data = Value::Object(data_fields(data)?);

        sqlx::query_scalar::<_, Value>(
            r#"
            UPDATE entity_records
            SET data = data || $3, updated_at = now()
            WHERE entity = $1
                AND id = (
                    SELECT id
                    FROM entity_records
                    WHERE entity = $1 AND data @> $2
                    ORDER BY created_at, id
                    LIMIT 1
                )
            RETURNING data
            "#,
        )
        .bind(entity)
        .bind(filter)
        .bind(data)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to update {entity} row: {error}")))?
        .ok_or_else(|| not_found(entity, filter))
    }

    async fn delete(&self, entity: &str, filter: &Value) -> AppResult<Value> {
        filter_fields(filter)?;

        sqlx::query_scalar::<_, Value>(
            r#"
            DELETE FROM entity_records
            WHERE entity = $1
                AND id = (
                    SELECT id
                    FROM entity_records
                    WHERE entity = $1 AND data @> $2
                    ORDER BY created_at, id
                    LIMIT 1
                )
            RETURNING data
            "#,
        )
        .bind(entity)
        .bind(filter)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to delete {entity} row: {error}")))?
        .ok_or_else(|| not_found(entity, filter))
    }

    async fn upsert(
        &self,
        entity: &str,
        filter: &Value,
        create: Value,
        update: Value,
    ) -> AppResult<Value> {
        filter_fields(filter)?;
        let update = Value::Object(data_fields(update)?);
        let mut transaction = begin(&self.pool).await?;

        let existing_id = sqlx::query_scalar::<_, String>(
            r#"
            SELECT id
            FROM entity_records
            WHERE entity = $1 AND data @> $2
            ORDER BY created_at, id
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(entity)
        .bind(filter)
        .fetch_optional(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to lock {entity} row: {error}")))?;

        let row = match existing_id {
            Some(id) => sqlx::query_scalar::<_, Value>(
                r#"
                UPDATE entity_records
                SET data = data || $3, updated_at = now()
                WHERE entity = $1 AND id = $2
                RETURNING data
                "#,
            )
            .bind(entity)
            .bind(id.as_str())
            .bind(update)
            .fetch_one(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to update {entity} '{id}': {error}"))
            })?,
            None => insert_row(&mut transaction, entity, create).await?,
        };

        commit(transaction).await?;
        Ok(row)
    }

    async fn create_many(&self, entity: &str, rows: Vec<Value>) -> AppResult<BatchCount> {
        let mut transaction = begin(&self.pool).await?;
        let mut count = 0;
        for row in rows {
            insert_row(&mut transaction, entity, row).await?;
            count += 1;
        }
        commit(transaction).await?;

        Ok(BatchCount { count })
    }

    async fn update_many(
        &self,
        entity: &str,
        filter: &Value,
        data: Value,
    ) -> AppResult<BatchCount> {
        filter_fields(filter)?;
        let data = Value::Object(data_fields(data)?);

        let result = sqlx::query(
            r#"
            UPDATE entity_records
            SET data = data || $3, updated_at = now()
            WHERE entity = $1 AND data @> $2
            "#,
        )
        .bind(entity)
        .bind(filter)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to update {entity} rows: {error}")))?;

        Ok(BatchCount {
            count: result.rows_affected(),
        })
    }

    async fn delete_many(&self, entity: &str, filter: &Value) -> AppResult<BatchCount> {
        filter_fields(filter)?;

        let result = sqlx::query(
            r#"
            DELETE FROM entity_records
            WHERE entity = $1 AND data @> $2
            "#,
        )
        .bind(entity)
        .bind(filter)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to delete {entity} rows: {error}")))?;

        Ok(BatchCount {
            count: result.rows_affected(),
        })
    }
}
