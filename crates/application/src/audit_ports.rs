use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fincontrol_core::AppResult;
use fincontrol_domain::AuditAction;
use serde_json::Value;

/// Append-only audit record produced by the change-capture interceptor.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    /// Audited entity type name.
    pub entity: String,
    /// Affected row id, or the unknown marker for bulk operations.
    pub entity_id: String,
    /// Semantic action label.
    pub action: AuditAction,
    /// Acting user, absent for unattributed operations.
    pub actor_id: Option<String>,
    /// Origin network address.
    pub ip: Option<String>,
    /// Origin client descriptor.
    pub user_agent: Option<String>,
    /// Rendered diff payload.
    pub diff: Option<Value>,
    /// Capture time.
    pub at: DateTime<Utc>,
}

/// Port for persisting audit records. Implementations only ever insert.
#[async_trait]
pub trait AuditRecordStore: Send + Sync {
    /// Appends one record.
    async fn insert(&self, record: AuditRecord) -> AppResult<()>;
}

/// Stored audit record projection for administrative views.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditLogEntry {
    /// Stable record identifier.
    pub record_id: String,
    /// Audited entity type name.
    pub entity: String,
    /// Affected row id.
    pub entity_id: String,
    /// Semantic action label.
    pub action: AuditAction,
    /// Acting user.
    pub actor_id: Option<String>,
    /// Origin network address.
    pub ip: Option<String>,
    /// Origin client descriptor.
    pub user_agent: Option<String>,
    /// Diff payload.
    pub diff: Option<Value>,
    /// Capture timestamp in RFC3339.
    pub at: String,
}

/// Query parameters for audit log listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditLogQuery {
    /// Maximum rows returned.
    pub limit: usize,
    /// Number of rows skipped for offset pagination.
    pub offset: usize,
    /// Optional entity type filter.
    pub entity: Option<String>,
    /// Optional row id filter.
    pub entity_id: Option<String>,
    /// Optional action filter.
    pub action: Option<AuditAction>,
    /// Optional actor filter.
    pub actor_id: Option<String>,
}

impl AuditLogQuery {
    /// Largest page a caller may request.
    pub const MAX_LIMIT: usize = 200;
    /// Deepest offset a caller may request.
    pub const MAX_OFFSET: usize = 5_000;

    /// Returns the query with limit and offset clamped to the allowed window.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.limit = self.limit.clamp(1, Self::MAX_LIMIT);
        self.offset = self.offset.min(Self::MAX_OFFSET);
        self
    }
}

/// Repository port for reading stored audit records, newest first.
#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    /// Lists records matching the query.
    async fn list_records(&self, query: AuditLogQuery) -> AppResult<Vec<AuditLogEntry>>;
}
