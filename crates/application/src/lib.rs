//! Application services and ports.

#![forbid(unsafe_code)]

mod actor_context;
mod audit_interceptor;
mod audit_log_service;
mod audit_ports;
mod audited_repository;
mod authorization_service;
mod entity_ports;
mod record_service;

pub use actor_context::{ActorContext, actor_context, run_as_actor, spawn_with_actor};
pub use audit_interceptor::{AuditInterceptor, MutationCall};
pub use audit_log_service::AuditLogService;
pub use audit_ports::{
    AuditLogEntry, AuditLogQuery, AuditLogRepository, AuditRecord, AuditRecordStore,
};
pub use audited_repository::AuditedEntityRepository;
pub use authorization_service::{AuthorizationRepository, AuthorizationService};
pub use entity_ports::{
    AuditSnapshot, BatchCount, EntityListQuery, EntityRepository, SnapshotReader,
};
pub use record_service::RecordService;
