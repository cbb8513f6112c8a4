use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use fincontrol_core::AppResult;
use fincontrol_domain::{AuditPolicy, OperationKind, classify_action, resolve_entity_id};
use serde_json::{Value, json};
use tracing::{debug, error, warn};

use crate::actor_context::actor_context;
use crate::audit_ports::{AuditRecord, AuditRecordStore};
use crate::entity_ports::{AuditSnapshot, SnapshotReader};

/// One data-mutating call as seen by the interceptor.
#[derive(Debug, Clone, Copy)]
pub struct MutationCall<'a> {
    /// Entity type name.
    pub entity: &'a str,
    /// Operation-kind tag.
    pub kind: &'a OperationKind,
    /// `where`-style filter of the call, when it has one.
    pub filter: Option<&'a Value>,
}

/// Change-capture wrapper around data-mutating operations.
///
/// Snapshot reads and audit writes are best effort: their failures are
/// logged and never reach the caller. Failures of the wrapped operation are
/// returned unchanged and produce no record.
#[derive(Clone)]
pub struct AuditInterceptor {
    store: Arc<dyn AuditRecordStore>,
    policy: Arc<AuditPolicy>,
}

impl AuditInterceptor {
    /// Creates an interceptor writing to `store` under `policy`.
    #[must_use]
    pub fn new(store: Arc<dyn AuditRecordStore>, policy: AuditPolicy) -> Self {
        Self {
            store,
            policy: Arc::new(policy),
        }
    }

    /// Runs `perform` and records what it changed.
    pub async fn intercept<R, T, F, Fut>(
        &self,
        reader: &R,
        call: MutationCall<'_>,
        perform: F,
    ) -> AppResult<T>
    where
        R: SnapshotReader + ?Sized,
        T: AuditSnapshot,
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        if !self.policy.captures(call.entity, call.kind) {
            return perform().await;
        }

        let before = self.before_snapshot(reader, call).await;
        let result = perform().await?;

        let after = (call.kind.returns_row() || call.kind.is_bulk())
            .then(|| result.audit_snapshot());
        let action = classify_action(call.kind, before.as_ref(), after.as_ref());
        let diff = self.policy.redaction().diff(before.as_ref(), after.as_ref());

        if *call.kind == OperationKind::Update && diff.is_none() {
            debug!(
                entity = call.entity,
                "update changed no fields, skipping audit record"
            );
            return Ok(result);
        }

        let actor = actor_context();
        let record = AuditRecord {
            entity: call.entity.to_owned(),
            entity_id: resolve_entity_id(before.as_ref(), after.as_ref()),
            action,
            actor_id: actor.user_id,
            ip: actor.ip,
            user_agent: actor.user_agent,
            diff: diff.map(|diff| diff.to_value()),
            at: Utc::now(),
        };

        if let Err(write_error) = self.store.insert(record).await {
            error!(
                entity = call.entity,
                operation = %call.kind,
                error = %write_error,
                "failed to write audit record"
            );
        }

        Ok(result)
    }

    async fn before_snapshot<R>(&self, reader: &R, call: MutationCall<'_>) -> Option<Value>
    where
        R: SnapshotReader + ?Sized,
    {
        if call.kind.is_filtered_bulk() {
            return Some(json!({ "where": call.filter.cloned().unwrap_or_else(|| json!({})) }));
        }

        if !call.kind.reads_prior_row() {
            return None;
        }

        let filter = call.filter?;
        match reader.read_snapshot(call.entity, filter).await {
            Ok(snapshot) => snapshot,
            Err(read_error) => {
                warn!(
                    entity = call.entity,
                    operation = %call.kind,
                    error = %read_error,
                    "failed to read prior state for audit"
                );
                None
            }
        }
    }
}
