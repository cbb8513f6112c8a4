use async_trait::async_trait;
use fincontrol_core::AppResult;
use serde::Serialize;
use serde_json::{Value, json};

/// Number of rows touched by a bulk operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchCount {
    /// Affected row count.
    pub count: u64,
}

/// Query inputs for entity row listing.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityListQuery {
    /// Maximum rows returned.
    pub limit: usize,
    /// Number of rows skipped for offset pagination.
    pub offset: usize,
    /// Exact-match filter object, fields combined with logical AND.
    pub filter: Option<Value>,
}

impl EntityListQuery {
    /// Largest page a caller may request.
    pub const MAX_LIMIT: usize = 500;
    /// Deepest offset a caller may request.
    pub const MAX_OFFSET: usize = 100_000;

    /// Returns the query with limit and offset clamped to the allowed window.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.limit = self.limit.clamp(1, Self::MAX_LIMIT);
        self.offset = self.offset.min(Self::MAX_OFFSET);
        self
    }
}

/// Data access port over JSON rows keyed by entity type name.
///
/// Filters are JSON objects whose fields must all equal the row's fields.
/// Single-row operations act on the first row matching the filter.
#[async_trait]
pub trait EntityRepository: Send + Sync {
    /// Finds one row matching the filter.
    async fn find_unique(&self, entity: &str, filter: &Value) -> AppResult<Option<Value>>;

    /// Lists rows ordered by creation.
    async fn find_many(&self, entity: &str, query: EntityListQuery) -> AppResult<Vec<Value>>;

    /// Inserts one row and returns it with its generated id.
    async fn create(&self, entity: &str, data: Value) -> AppResult<Value>;

    /// Merges `data` into the matching row and returns the updated row.
    async fn update(&self, entity: &str, filter: &Value, data: Value) -> AppResult<Value>;

    /// Removes the matching row and returns it.
    async fn delete(&self, entity: &str, filter: &Value) -> AppResult<Value>;

    /// Updates the matching row with `update`, or inserts `create` when none matches.
    async fn upsert(
        &self,
        entity: &str,
        filter: &Value,
        create: Value,
        update: Value,
    ) -> AppResult<Value>;

    /// Inserts several rows.
    async fn create_many(&self, entity: &str, rows: Vec<Value>) -> AppResult<BatchCount>;

    /// Merges `data` into every matching row.
    async fn update_many(&self, entity: &str, filter: &Value, data: Value)
    -> AppResult<BatchCount>;

    /// Removes every matching row.
    async fn delete_many(&self, entity: &str, filter: &Value) -> AppResult<BatchCount>;
}

/// Port used by the interceptor to read a row before it is mutated.
#[async_trait]
pub trait SnapshotReader: Send + Sync {
    /// Returns the current row matching the filter, if any.
    async fn read_snapshot(&self, entity: &str, filter: &Value) -> AppResult<Option<Value>>;
}

#[async_trait]
impl<R> SnapshotReader for R
where
    R: EntityRepository + ?Sized,
{
    async fn read_snapshot(&self, entity: &str, filter: &Value) -> AppResult<Option<Value>> {
        self.find_unique(entity, filter).await
    }
}

/// Converts an operation result into its after-snapshot.
pub trait AuditSnapshot {
    /// Returns the JSON snapshot recorded as the after-state.
    fn audit_snapshot(&self) -> Value;
}

impl AuditSnapshot for Value {
    fn audit_snapshot(&self) -> Value {
        self.clone()
    }
}

impl AuditSnapshot for BatchCount {
    fn audit_snapshot(&self) -> Value {
        json!({ "count": self.count })
    }
}

#[cfg(test)]
mod tests {
    use super::EntityListQuery;

    #[test]
    fn clamped_keeps_pagination_in_range() {
        let query = EntityListQuery {
            limit: 0,
            offset: usize::MAX,
            filter: None,
        }
        .clamped();

        assert_eq!(query.limit, 1);
        assert_eq!(query.offset, EntityListQuery::MAX_OFFSET);
        assert!(i64::try_from(query.offset).is_ok());
    }
}
