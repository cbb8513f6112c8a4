use std::sync::Arc;

use async_trait::async_trait;
use fincontrol_core::AppResult;
use fincontrol_domain::OperationKind;
use serde_json::Value;

use crate::audit_interceptor::{AuditInterceptor, MutationCall};
use crate::entity_ports::{BatchCount, EntityListQuery, EntityRepository};

/// Repository decorator that routes every mutating call through the audit interceptor.
#[derive(Clone)]
pub struct AuditedEntityRepository {
    inner: Arc<dyn EntityRepository>,
    interceptor: AuditInterceptor,
}

impl AuditedEntityRepository {
    /// Wraps `inner` so its mutations are captured by `interceptor`.
    #[must_use]
    pub fn new(inner: Arc<dyn EntityRepository>, interceptor: AuditInterceptor) -> Self {
        Self { inner, interceptor }
    }
}

#[async_trait]
impl EntityRepository for AuditedEntityRepository {
    // Reads are never captured and skip the interceptor entirely.
    async fn find_unique(&self, entity: &str, filter: &Value) -> AppResult<Option<Value>> {
        self.inner.find_unique(entity, filter).await
    }

    async fn find_many(&self, entity: &str, query: EntityListQuery) -> AppResult<Vec<Value>> {
        self.inner.find_many(entity, query).await
    }

    async fn create(&self, entity: &str, data: Value) -> AppResult<Value> {
        let kind = OperationKind::Create;
        let call = MutationCall {
            entity,
            kind: &kind,
            filter: None,
        };

        self.interceptor
            .intercept(self.inner.as_ref(), call, || self.inner.create(entity, data))
            .await
    }

    async fn update(&self, entity: &str, filter: &Value, data: Value) -> AppResult<Value> {
        let kind = OperationKind::Update;
        let call = MutationCall {
            entity,
            kind: &kind,
            filter: Some(filter),
        };

        self.interceptor
            .intercept(self.inner.as_ref(), call, || {
                self.inner.update(entity, filter, data)
            })
            .await
    }

    async fn delete(&self, entity: &str, filter: &Value) -> AppResult<Value> {
        let kind = OperationKind::Delete;
        let call = MutationCall {
            entity,
            kind: &kind,
            filter: Some(filter),
        };

        self.interceptor
            .intercept(self.inner.as_ref(), call, || self.inner.delete(entity, filter))
            .await
    }

    async fn upsert(
        &self,
        entity: &str,
        filter: &Value,
        create: Value,
        update: Value,
    ) -> AppResult<Value> {
        let kind = OperationKind::Upsert;
        let call = MutationCall {
            entity,
            kind: &kind,
            filter: Some(filter),
        };

        self.interceptor
            .intercept(self.inner.as_ref(), call, || {
                self.inner.upsert(entity, filter, create, update)
            })
            .await
    }

    async fn create_many(&self, entity: &str, rows: Vec<Value>) -> AppResult<BatchCount> {
        let kind = OperationKind::CreateMany;
        let call = MutationCall {
            entity,
            kind: &kind,
            filter: None,
        };

        self.interceptor
            .intercept(self.inner.as_ref(), call, || {
                self.inner.create_many(entity, rows)
            })
            .await
    }

    async fn update_many(
        &self,
        entity: &str,
        filter: &Value,
        data: Value,
    ) -> AppResult<BatchCount> {
        let kind = OperationKind::UpdateMany;
        let call = MutationCall {
            entity,
            kind: &kind,
            filter: Some(filter),
        };

        self.interceptor
            .intercept(self.inner.as_ref(), call, || {
                self.inner.update_many(entity, filter, data)
            })
            .await
    }

    async fn delete_many(&self, entity: &str, filter: &Value) -> AppResult<BatchCount> {
        let kind = OperationKind::DeleteMany;
        let call = MutationCall {
            entity,
            kind: &kind,
            filter: Some(filter),
        };

        self.interceptor
            .intercept(self.inner.as_ref(), call, || {
                self.inner.delete_many(entity, filter)
            })
            .await
    }
}
