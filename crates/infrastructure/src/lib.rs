//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod entity_rows;
mod in_memory_audit_log;
mod in_memory_authorization_repository;
mod in_memory_entity_repository;
mod postgres_audit_log_repository;
mod postgres_audit_record_store;
mod postgres_authorization_repository;
mod postgres_entity_repository;

pub use in_memory_audit_log::InMemoryAuditLog;
pub use in_memory_authorization_repository::InMemoryAuthorizationRepository;
pub use in_memory_entity_repository::InMemoryEntityRepository;
pub use postgres_audit_log_repository::PostgresAuditLogRepository;
pub use postgres_audit_record_store::PostgresAuditRecordStore;
pub use postgres_authorization_repository::PostgresAuthorizationRepository;
pub use postgres_entity_repository::PostgresEntityRepository;
