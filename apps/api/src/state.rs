use axum::http::HeaderName;
use fincontrol_application::{AuditLogService, RecordService};
use sqlx::PgPool;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub record_service: RecordService,
    pub audit_log_service: AuditLogService,
    pub identity_header: HeaderName,
    pub audit_enabled: bool,
    pub postgres_pool: PgPool,
}
