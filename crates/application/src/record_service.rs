use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use fincontrol_core::{AppError, AppResult, UserIdentity};
use fincontrol_domain::{AuditedEntity, Permission, SOFT_DELETE_FIELD};
use serde_json::{Map, Value, json};

use crate::AuthorizationService;
use crate::entity_ports::{BatchCount, EntityListQuery, EntityRepository};

/// Application service for back-office entity rows.
///
/// The repository handed to this service is expected to be the audited
/// decorator; the service itself only validates input and checks
/// permissions.
#[derive(Clone)]
pub struct RecordService {
    authorization_service: AuthorizationService,
    repository: Arc<dyn EntityRepository>,
}

impl RecordService {
    /// Creates a new record service.
    #[must_use]
    pub fn new(
        authorization_service: AuthorizationService,
        repository: Arc<dyn EntityRepository>,
    ) -> Self {
        Self {
            authorization_service,
            repository,
        }
    }

    /// Lists rows of an entity.
    pub async fn list_records(
        &self,
        actor: &UserIdentity,
        entity: &str,
        query: EntityListQuery,
    ) -> AppResult<Vec<Value>> {
        let entity = self.authorize_read(actor, entity).await?;
        if let Some(filter) = &query.filter {
            require_object(filter, "filter")?;
        }

        self.repository
            .find_many(entity.as_str(), query.clamped())
            .await
    }

    /// Returns one row by id.
    pub async fn get_record(
        &self,
        actor: &UserIdentity,
        entity: &str,
        record_id: &str,
    ) -> AppResult<Value> {
        let entity = self.authorize_read(actor, entity).await?;

        self.repository
            .find_unique(entity.as_str(), &id_filter(record_id))
            .await?
            .ok_or_else(|| not_found(entity, record_id))
    }

    /// Inserts one row.
    pub async fn create_record(
        &self,
        actor: &UserIdentity,
        entity: &str,
        data: Value,
    ) -> AppResult<Value> {
        let entity = self.authorize_write(actor, entity).await?;
        require_object(&data, "record data")?;

        self.repository.create(entity.as_str(), data).await
    }

    /// Inserts several rows at once.
    pub async fn create_records(
        &self,
        actor: &UserIdentity,
        entity: &str,
        rows: Vec<Value>,
    ) -> AppResult<BatchCount> {
        let entity = self.authorize_write(actor, entity).await?;
        if rows.is_empty() {
            return Err(AppError::Validation(
                "bulk create requires at least one row".to_owned(),
            ));
        }
        for row in &rows {
            require_object(row, "record data")?;
        }

        self.repository.create_many(entity.as_str(), rows).await
    }

    /// Merges `data` into an existing row.
    pub async fn update_record(
        &self,
        actor: &UserIdentity,
        entity: &str,
        record_id: &str,
        data: Value,
    ) -> AppResult<Value> {
        let entity = self.authorize_write(actor, entity).await?;
        require_mutable_fields(&data)?;

        self.repository
            .update(entity.as_str(), &id_filter(record_id), data)
            .await
    }

    /// Replaces a row by id, creating it when it does not exist yet.
    pub async fn save_record(
        &self,
        actor: &UserIdentity,
        entity: &str,
        record_id: &str,
        data: Value,
    ) -> AppResult<Value> {
        let entity = self.authorize_write(actor, entity).await?;
        require_mutable_fields(&data)?;

        let mut create = data.clone();
        if let Value::Object(object) = &mut create {
            object.insert("id".to_owned(), Value::String(record_id.to_owned()));
        }

        self.repository
            .upsert(entity.as_str(), &id_filter(record_id), create, data)
            .await
    }

    /// Physically removes a row.
    pub async fn delete_record(
        &self,
        actor: &UserIdentity,
        entity: &str,
        record_id: &str,
    ) -> AppResult<Value> {
        let entity = self.authorize_write(actor, entity).await?;

        self.repository
            .delete(entity.as_str(), &id_filter(record_id))
            .await
    }

    /// Marks a row as deleted by setting its soft-delete timestamp.
    pub async fn soft_delete_record(
        &self,
        actor: &UserIdentity,
        entity: &str,
        record_id: &str,
    ) -> AppResult<Value> {
        let entity = self.authorize_write(actor, entity).await?;
        let mut data = Map::new();
        data.insert(
            SOFT_DELETE_FIELD.to_owned(),
            Value::String(Utc::now().to_rfc3339()),
        );

        self.repository
            .update(entity.as_str(), &id_filter(record_id), Value::Object(data))
            .await
    }

    /// Merges `data` into every row matching `filter`.
    pub async fn update_records(
        &self,
        actor: &UserIdentity,
        entity: &str,
        filter: Value,
        data: Value,
    ) -> AppResult<BatchCount> {
        let entity = self.authorize_write(actor, entity).await?;
        require_bulk_filter(&filter)?;
        require_mutable_fields(&data)?;

        self.repository
            .update_many(entity.as_str(), &filter, data)
            .await
    }

    /// Removes every row matching `filter`.
    pub async fn delete_records(
        &self,
        actor: &UserIdentity,
        entity: &str,
        filter: Value,
    ) -> AppResult<BatchCount> {
        let entity = self.authorize_write(actor, entity).await?;
        require_bulk_filter(&filter)?;

        self.repository.delete_many(entity.as_str(), &filter).await
    }

    async fn authorize_read(&self, actor: &UserIdentity, entity: &str) -> AppResult<AuditedEntity> {
        let entity = AuditedEntity::from_str(entity)?;
        self.authorization_service
            .require_permission(actor.subject(), Permission::read_for(entity))
            .await?;
        Ok(entity)
    }

    async fn authorize_write(
        &self,
        actor: &UserIdentity,
        entity: &str,
    ) -> AppResult<AuditedEntity> {
        let entity = AuditedEntity::from_str(entity)?;
        self.authorization_service
            .require_permission(actor.subject(), Permission::write_for(entity))
            .await?;
        Ok(entity)
    }
}

fn id_filter(record_id: &str) -> Value {
    json!({ "id": record_id })
}

fn not_found(entity: AuditedEntity, record_id: &str) -> AppError {
    AppError::NotFound(format!("{entity} '{record_id}' does not exist"))
}

fn require_object(value: &Value, label: &str) -> AppResult<()> {
    if value.is_object() {
        Ok(())
    } else {
        Err(AppError::Validation(format!("{label} must be a JSON object")))
    }
}

fn require_mutable_fields(data: &Value) -> AppResult<()> {
    require_object(data, "record data")?;
    if data.get("id").is_some() {
        return Err(AppError::Validation("record id cannot be changed".to_owned()));
    }
    Ok(())
}

fn require_bulk_filter(filter: &Value) -> AppResult<()> {
    match filter.as_object() {
        Some(object) if !object.is_empty() => Ok(()),
        _ => Err(AppError::Validation(
            "bulk operations require a non-empty filter object".to_owned(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::{Value, json};

    use fincontrol_core::{AppError, AppResult, UserIdentity};
    use fincontrol_domain::{Permission, PermissionGrants};

    use crate::entity_ports::{BatchCount, EntityListQuery, EntityRepository};
    use crate::{AuthorizationRepository, AuthorizationService};

    use super::RecordService;

    struct AllGrants;

    #[async_trait]
    impl AuthorizationRepository for AllGrants {
        async fn load_grants(&self, _subject: &str) -> AppResult<PermissionGrants> {
            Ok(PermissionGrants {
                role_grants: Permission::all().to_vec(),
                ..PermissionGrants::default()
            })
        }
    }

    /// Repository that fails every call, proving validation runs first.
    struct UnreachableRepository;

    fn not_expected<T>() -> AppResult<T> {
        Err(AppError::Internal("repository must not be called".to_owned()))
    }

    #[async_trait]
    impl EntityRepository for UnreachableRepository {
        async fn find_unique(&self, _entity: &str, _filter: &Value) -> AppResult<Option<Value>> {
            Ok(None)
        }

        async fn find_many(&self, _entity: &str, _query: EntityListQuery) -> AppResult<Vec<Value>> {
            not_expected()
        }

        async fn create(&self, _entity: &str, _data: Value) -> AppResult<Value> {
            not_expected()
        }

        async fn update(&self, _entity: &str, _filter: &Value, _data: Value) -> AppResult<Value> {
            not_expected()
        }

        async fn delete(&self, _entity: &str, _filter: &Value) -> AppResult<Value> {
            not_expected()
        }

        async fn upsert(
            &self,
            _entity: &str,
            _filter: &Value,
            _create: Value,
            _update: Value,
        ) -> AppResult<Value> {
            not_expected()
        }

        async fn create_many(&self, _entity: &str, _rows: Vec<Value>) -> AppResult<BatchCount> {
            not_expected()
        }

        async fn update_many(
            &self,
            _entity: &str,
            _filter: &Value,
            _data: Value,
        ) -> AppResult<BatchCount> {
            not_expected()
        }

        async fn delete_many(&self, _entity: &str, _filter: &Value) -> AppResult<BatchCount> {
            not_expected()
        }
    }

    fn service() -> RecordService {
        RecordService::new(
            AuthorizationService::new(Arc::new(AllGrants)),
            Arc::new(UnreachableRepository),
        )
    }

    fn actor() -> UserIdentity {
        UserIdentity::from_subject("admin").unwrap_or_else(|_| unreachable!())
    }

    #[tokio::test]
    async fn unknown_entity_is_rejected() {
        let result = service()
            .create_record(&actor(), "Payroll", json!({"amount": 1}))
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn non_object_payload_is_rejected() {
        let result = service()
            .create_record(&actor(), "Vendor", json!(["not", "a", "row"]))
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn id_cannot_be_rewritten() {
        let result = service()
            .update_record(&actor(), "Vendor", "v1", json!({"id": "v2"}))
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn bulk_delete_requires_filter() {
        let result = service()
            .delete_records(&actor(), "Expense", json!({}))
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn missing_row_is_not_found() {
        let result = service().get_record(&actor(), "Account", "a404").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
