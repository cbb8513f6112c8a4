use std::sync::Arc;

use async_trait::async_trait;
use fincontrol_core::{AppError, AppResult};
use fincontrol_domain::{Permission, PermissionGrants};

/// Repository port for permission grant lookups.
#[async_trait]
pub trait AuthorizationRepository: Send + Sync {
    /// Loads role grants, direct grants and direct denies for a subject.
    async fn load_grants(&self, subject: &str) -> AppResult<PermissionGrants>;
}

/// Application service for permission checks.
#[derive(Clone)]
pub struct AuthorizationService {
    repository: Arc<dyn AuthorizationRepository>,
}

impl AuthorizationService {
    /// Creates a new authorization service from a repository implementation.
    #[must_use]
    pub fn new(repository: Arc<dyn AuthorizationRepository>) -> Self {
        Self { repository }
    }

    /// Returns whether the subject currently has the permission.
    pub async fn has_permission(&self, subject: &str, permission: Permission) -> AppResult<bool> {
        Ok(self.repository.load_grants(subject).await?.allows(permission))
    }

    /// Ensures a subject has the required permission.
    pub async fn require_permission(&self, subject: &str, permission: Permission) -> AppResult<()> {
        if self.has_permission(subject, permission).await? {
            return Ok(());
        }

        Err(AppError::Forbidden(format!(
            "subject '{subject}' is missing permission '{}'",
            permission.as_str()
        )))
    }
}
