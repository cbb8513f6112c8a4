//! Domain vocabulary and invariants for the fincontrol audit trail.

#![forbid(unsafe_code)]

mod audit;
mod audit_diff;
mod security;

pub use audit::{
    AUDIT_LOG_ENTITY, AuditAction, AuditPolicy, AuditedEntity, OperationKind, SOFT_DELETE_FIELD,
    UNKNOWN_ENTITY_ID, classify_action, resolve_entity_id,
};
pub use audit_diff::{
    AuditDiff, DEFAULT_REDACTED_FIELDS, FieldChange, REDACTED_MARKER, RedactionPolicy,
};
pub use security::{Permission, PermissionGrants};
