use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use fincontrol_application::AuthorizationRepository;
use fincontrol_core::AppResult;
use fincontrol_domain::{Permission, PermissionGrants};

#[derive(Debug, Default)]
struct GrantTables {
    role_grants: HashMap<String, Vec<Permission>>,
    subject_roles: HashMap<String, Vec<String>>,
    subject_grants: HashMap<String, Vec<Permission>>,
    subject_denies: HashMap<String, Vec<Permission>>,
}

/// In-memory role and grant tables for local runs and tests.
#[derive(Debug, Default)]
pub struct InMemoryAuthorizationRepository {
    tables: RwLock<GrantTables>,
}

impl InMemoryAuthorizationRepository {
    /// Creates an empty repository where nobody holds any permission.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a permission to a role.
    pub async fn grant_role_permission(&self, role: &str, permission: Permission) {
        self.tables
            .write()
            .await
            .role_grants
            .entry(role.to_owned())
            .or_default()
            .push(permission);
    }

    /// Assigns a role to a subject.
    pub async fn assign_role(&self, subject: &str, role: &str) {
        self.tables
            .write()
            .await
            .subject_roles
            .entry(subject.to_owned())
            .or_default()
            .push(role.to_owned());
    }

    /// Grants a permission directly to a subject.
    pub async fn grant_subject_permission(&self, subject: &str, permission: Permission) {
        self.tables
            .write()
            .await
            .subject_grants
            .entry(subject.to_owned())
            .or_default()
            .push(permission);
    }

    /// Denies a permission to a subject regardless of its roles.
    pub async fn deny_subject_permission(&self, subject: &str, permission: Permission) {
        self.tables
            .write()
            .await
            .subject_denies
            .entry(subject.to_owned())
            .or_default()
            .push(permission);
    }
}

#[async_trait]
impl AuthorizationRepository for InMemoryAuthorizationRepository {
    async fn load_grants(&self, subject: &str) -> AppResult<PermissionGrants> {
        let tables = self.tables.read().await;

        let role_grants = tables
            .subject_roles
            .get(subject)
            .into_iter()
            .flatten()
            .filter_map(|role| tables.role_grants.get(role))
            .flatten()
            .copied()
            .collect();

        Ok(PermissionGrants {
            role_grants,
            user_grants: tables
                .subject_grants
                .get(subject)
                .cloned()
                .unwrap_or_default(),
            user_denies: tables
                .subject_denies
                .get(subject)
                .cloned()
                .unwrap_or_default(),
        })
    }
}
