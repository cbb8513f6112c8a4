use std::str::FromStr;

use async_trait::async_trait;

use fincontrol_application::AuthorizationRepository;
use fincontrol_core::{AppError, AppResult};
use fincontrol_domain::{Permission, PermissionGrants};

use sqlx::{FromRow, PgPool};

/// PostgreSQL-backed repository for subject permission lookups.
#[derive(Clone)]
pub struct PostgresAuthorizationRepository {
    pool: PgPool,
}

impl PostgresAuthorizationRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct GrantRow {
    source: String,
    permission: String,
}

fn decode_permission(subject: &str, value: &str) -> AppResult<Permission> {
    Permission::from_str(value).map_err(|error| {
        AppError::Internal(format!(
            "failed to decode permission '{value}' for subject '{subject}': {error}"
        ))
    })
}

#[async_trait]
impl AuthorizationRepository for PostgresAuthorizationRepository {
    async fn load_grants(&self, subject: &str) -> AppResult<PermissionGrants> {
        let rows = sqlx::query_as::<_, GrantRow>(
            r#"
            SELECT 'role' AS source, grants.permission
            FROM rbac_subject_roles AS subject_roles
            INNER JOIN rbac_role_grants AS grants
                ON grants.role_name = subject_roles.role_name
            WHERE subject_roles.subject = $1
            UNION ALL
            SELECT subject_grants.effect AS source, subject_grants.permission
            FROM rbac_subject_grants AS subject_grants
            WHERE subject_grants.subject = $1
            "#,
        )
        .bind(subject)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load permissions: {error}")))?;

        let mut grants = PermissionGrants::default();
        for row in rows {
            let permission = decode_permission(subject, row.permission.as_str())?;
            match row.source.as_str() {
                "role" => grants.role_grants.push(permission),
                "grant" => grants.user_grants.push(permission),
                "deny" => grants.user_denies.push(permission),
                other => {
                    return Err(AppError::Internal(format!(
                        "unknown grant effect '{other}' for subject '{subject}'"
                    )));
                }
            }
        }

        Ok(grants)
    }
}
