use std::collections::HashMap;

use async_trait::async_trait;
use fincontrol_application::{BatchCount, EntityListQuery, EntityRepository};
use fincontrol_core::{AppError, AppResult};
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::entity_rows::{data_fields, filter_fields, id_text, prepare_insert};

/// In-memory entity repository implementation.
///
/// Rows are kept per entity in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryEntityRepository {
    rows: RwLock<HashMap<String, Vec<Value>>>,
}

impl InMemoryEntityRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
        }
    }
}

fn matches(row: &Value, filter: &Map<String, Value>) -> bool {
    filter
        .iter()
        .all(|(field, expected)| row.get(field) == Some(expected))
}

fn merge(row: &mut Value, data: &Map<String, Value>) {
    if let Value::Object(fields) = row {
        for (field, value) in data {
            fields.insert(field.clone(), value.clone());
        }
    }
}

fn not_found(entity: &str, filter: &Value) -> AppError {
    AppError::NotFound(format!("no {entity} row matches {filter}"))
}

fn insert_row(rows: &mut Vec<Value>, entity: &str, data: Value) -> AppResult<Value> {
    let (id, row) = prepare_insert(data)?;

    if rows
        .iter()
        .any(|existing| existing.get("id").and_then(id_text).as_deref() == Some(id.as_str()))
    {
        return Err(AppError::Conflict(format!("{entity} '{id}' already exists")));
    }

    rows.push(row.clone());
    Ok(row)
}

#[async_trait]
impl EntityRepository for InMemoryEntityRepository {
    async fn find_unique(&self, entity: &str, filter: &Value) -> AppResult<Option<Value>> {
        let filter = filter_fields(filter)?;

        Ok(self
            .rows
            .read()
            .await
            .get(entity)
            .and_then(|rows| rows.iter().find(|row| matches(row, filter)).cloned()))
    }

    async fn find_many(&self, entity: &str, query: EntityListQuery) -> AppResult<Vec<Value>> {
        let empty = Map::new();
        let filter = match &query.filter {
            Some(filter) => filter_fields(filter)?,
            None => &empty,
        };

        Ok(self
            .rows
            .read()
            .await
            .get(entity)
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches(row, filter))
                    .skip(query.offset)
                    .take(query.limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn create(&self, entity: &str, data: Value) -> AppResult<Value> {
        let mut rows = self.rows.write().await;
        insert_row(rows.entry(entity.to_owned()).or_default(), entity, data)
    }

    async fn update(&self, entity: &str, filter: &Value, data: Value) -> AppResult<Value> {
        let fields = filter_fields(filter)?;
        let data = data_fields(data)?;
        let mut rows = self.rows.write().await;

        let row = rows
            .get_mut(entity)
            .and_then(|rows| rows.iter_mut().find(|row| matches(row, fields)))
            .ok_or_else(|| not_found(entity, filter))?;
        merge(row, &data);

        Ok(row.clone())
    }

    async fn delete(&self, entity: &str, filter: &Value) -> AppResult<Value> {
        let fields = filter_fields(filter)?;
        let mut rows = self.rows.write().await;

        let rows = rows
            .get_mut(entity)
            .ok_or_else(|| not_found(entity, filter))?;
        let position = rows
            .iter()
            .position(|row| matches(row, fields))
            .ok_or_else(|| not_found(entity, filter))?;

        Ok(rows.remove(position))
    }

    async fn upsert(
        &self,
        entity: &str,
        filter: &Value,
        create: Value,
        update: Value,
    ) -> AppResult<Value> {
        let fields = filter_fields(filter)?;
        let update = data_fields(update)?;
        let mut rows = self.rows.write().await;
        let rows = rows.entry(entity.to_owned()).or_default();

        if let Some(row) = rows.iter_mut().find(|row| matches(row, fields)) {
            merge(row, &update);
            return Ok(row.clone());
        }

        insert_row(rows, entity, create)
    }

    async fn create_many(&self, entity: &str, rows: Vec<Value>) -> AppResult<BatchCount> {
        let mut stored = self.rows.write().await;
        let stored = stored.entry(entity.to_owned()).or_default();

        // Validate the whole batch before touching stored rows.
        let mut staged = stored.clone();
        for row in rows {
            insert_row(&mut staged, entity, row)?;
        }

        let count = (staged.len() - stored.len()) as u64;
        *stored = staged;
        Ok(BatchCount { count })
    }

    async fn update_many(
        &self,
        entity: &str,
        filter: &Value,
        data: Value,
    ) -> AppResult<BatchCount> {
        let fields = filter_fields(filter)?;
        let data = data_fields(data)?;
        let mut rows = self.rows.write().await;

        let mut count = 0;
        if let Some(rows) = rows.get_mut(entity) {
            for row in rows.iter_mut().filter(|row| matches(row, fields)) {
                merge(row, &data);
                count += 1;
            }
        }

        Ok(BatchCount { count })
    }

    async fn delete_many(&self, entity: &str, filter: &Value) -> AppResult<BatchCount> {
        let fields = filter_fields(filter)?;
        let mut rows = self.rows.write().await;

        let Some(rows) = rows.get_mut(entity) else {
            return Ok(BatchCount { count: 0 });
        };
        let before = rows.len();
        rows.retain(|row| !matches(row, fields));

        Ok(BatchCount {
            count: (before - rows.len()) as u64,
        })
    }
}
