use std::sync::Arc;

use fincontrol_core::{AppResult, UserIdentity};
use fincontrol_domain::Permission;

use crate::AuthorizationService;
use crate::audit_ports::{AuditLogEntry, AuditLogQuery, AuditLogRepository};

/// Read-side service over stored audit records.
#[derive(Clone)]
pub struct AuditLogService {
    authorization_service: AuthorizationService,
    repository: Arc<dyn AuditLogRepository>,
}

impl AuditLogService {
    /// Creates a new audit log service.
    #[must_use]
    pub fn new(
        authorization_service: AuthorizationService,
        repository: Arc<dyn AuditLogRepository>,
    ) -> Self {
        Self {
            authorization_service,
            repository,
        }
    }

    /// Lists audit records visible to the actor, newest first.
    pub async fn list_records(
        &self,
        actor: &UserIdentity,
        query: AuditLogQuery,
    ) -> AppResult<Vec<AuditLogEntry>> {
        self.authorization_service
            .require_permission(actor.subject(), Permission::AuditRead)
            .await?;

        self.repository.list_records(query.clamped()).await
    }
}
