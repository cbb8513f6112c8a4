use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use serde_json::json;

use fincontrol_application::{
    ActorContext, AuditInterceptor, AuditLogQuery, AuditLogRepository, AuditLogService,
    AuditRecord, AuditRecordStore, AuditedEntityRepository, AuthorizationService,
    EntityListQuery, RecordService, run_as_actor, spawn_with_actor,
};
use fincontrol_core::{AppError, UserIdentity};
use fincontrol_domain::{AuditAction, AuditPolicy, Permission, UNKNOWN_ENTITY_ID};

use super::InMemoryAuditLog;
use crate::{InMemoryAuthorizationRepository, InMemoryEntityRepository};

struct Harness {
    audit_log: Arc<InMemoryAuditLog>,
    records: RecordService,
    audit: AuditLogService,
}

async fn harness() -> Harness {
    let audit_log = Arc::new(InMemoryAuditLog::new());
    let authorization = Arc::new(InMemoryAuthorizationRepository::new());
    for permission in Permission::all() {
        authorization
            .grant_role_permission("admin", *permission)
            .await;
    }
    authorization.assign_role("ana", "admin").await;
    authorization
        .grant_subject_permission("bia", Permission::ExpenseWrite)
        .await;

    let interceptor = AuditInterceptor::new(audit_log.clone(), AuditPolicy::default());
    let repository = Arc::new(AuditedEntityRepository::new(
        Arc::new(InMemoryEntityRepository::new()),
        interceptor,
    ));
    let authorization_service = AuthorizationService::new(authorization);

    Harness {
        audit_log: audit_log.clone(),
        records: RecordService::new(authorization_service.clone(), repository),
        audit: AuditLogService::new(authorization_service, audit_log),
    }
}

fn identity(subject: &str) -> UserIdentity {
    UserIdentity::from_subject(subject).unwrap_or_else(|_| unreachable!())
}

fn request_context(subject: &str) -> ActorContext {
    ActorContext::empty()
        .with_user_id(subject)
        .with_ip("203.0.113.7")
        .with_user_agent("ledger-ui/2.1")
}

fn record_at(entity_id: &str, minutes: i64) -> AuditRecord {
    AuditRecord {
        entity: "Vendor".to_owned(),
        entity_id: entity_id.to_owned(),
        action: AuditAction::Updated,
        actor_id: Some("ana".to_owned()),
        ip: None,
        user_agent: None,
        diff: None,
        at: Utc
            .with_ymd_and_hms(2025, 3, 1, 12, 0, 0)
            .single()
            .unwrap_or_default()
            + Duration::minutes(minutes),
    }
}

#[tokio::test]
async fn user_creation_is_recorded_with_redacted_hash() {
    let harness = harness().await;
    let ana = identity("ana");

    let created = run_as_actor(
        request_context("ana"),
        harness.records.create_record(
            &ana,
            "User",
            json!({"id": "u1", "name": "Ana", "passwordHash": "abc123"}),
        ),
    )
    .await;
    assert!(created.is_ok());

    let records = harness.audit_log.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].action, AuditAction::Created);
    assert_eq!(records[0].entity, "User");
    assert_eq!(records[0].entity_id, "u1");
    assert_eq!(records[0].actor_id.as_deref(), Some("ana"));
    assert_eq!(records[0].ip.as_deref(), Some("203.0.113.7"));
    assert_eq!(records[0].user_agent.as_deref(), Some("ledger-ui/2.1"));
    assert_eq!(
        records[0].diff,
        Some(json!({"after": {"id": "u1", "name": "Ana", "passwordHash": "[REDACTED]"}}))
    );
}

#[tokio::test]
async fn soft_delete_is_classified_and_diffed() {
    let harness = harness().await;
    let ana = identity("ana");

    let created = harness
        .records
        .create_record(
            &ana,
            "Expense",
            json!({"id": "e1", "status": "ACTIVE", "deletedAt": null}),
        )
        .await;
    assert!(created.is_ok());

    let deleted = run_as_actor(
        request_context("ana"),
        harness.records.soft_delete_record(&ana, "Expense", "e1"),
    )
    .await
    .unwrap_or_else(|_| unreachable!());
    let deleted_at = deleted.get("deletedAt").cloned().unwrap_or_default();
    assert!(deleted_at.is_string());

    let records = harness.audit_log.records().await;
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].action, AuditAction::SoftDeleted);
    assert_eq!(records[1].entity_id, "e1");
    assert_eq!(
        records[1].diff,
        Some(json!({"deletedAt": {"before": null, "after": deleted_at}}))
    );
}

#[tokio::test]
async fn unchanged_update_returns_row_without_record() {
    let harness = harness().await;
    let ana = identity("ana");

    let created = harness
        .records
        .create_record(&ana, "Vendor", json!({"id": "v1", "name": "Acme"}))
        .await;
    assert!(created.is_ok());

    let updated = harness
        .records
        .update_record(&ana, "Vendor", "v1", json!({"name": "Acme"}))
        .await;

    assert_eq!(updated.ok(), Some(json!({"id": "v1", "name": "Acme"})));
    assert_eq!(harness.audit_log.records().await.len(), 1);
}

#[tokio::test]
async fn bulk_delete_records_filter_and_count() {
    let harness = harness().await;
    let ana = identity("ana");

    let created = harness
        .records
        .create_records(
            &ana,
            "Expense",
            vec![
                json!({"id": "e1", "status": "DRAFT"}),
                json!({"id": "e2", "status": "DRAFT"}),
                json!({"id": "e3", "status": "PAID"}),
            ],
        )
        .await;
    assert_eq!(created.map(|batch| batch.count).ok(), Some(3));

    let deleted = harness
        .records
        .delete_records(&ana, "Expense", json!({"status": "DRAFT"}))
        .await;
    assert_eq!(deleted.map(|batch| batch.count).ok(), Some(2));

    let records = harness.audit_log.records().await;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].action, AuditAction::BulkCreated);
    assert_eq!(records[1].action, AuditAction::BulkDeleted);
    assert_eq!(records[1].entity_id, UNKNOWN_ENTITY_ID);
    assert_eq!(
        records[1].diff,
        Some(json!({
            "where": {"before": {"status": "DRAFT"}},
            "count": {"after": 2}
        }))
    );
}

#[tokio::test]
async fn failed_operation_leaves_no_record() {
    let harness = harness().await;
    let ana = identity("ana");

    let result = harness
        .records
        .update_record(&ana, "Account", "missing", json!({"name": "Cash"}))
        .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert!(harness.audit_log.records().await.is_empty());
}

#[tokio::test]
async fn forbidden_write_is_not_attempted() {
    let harness = harness().await;
    let bia = identity("bia");

    let result = harness
        .records
        .create_record(&bia, "Vendor", json!({"name": "Acme"}))
        .await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
    assert!(harness.audit_log.records().await.is_empty());
}

#[tokio::test]
async fn concurrent_requests_keep_their_own_actor() {
    let harness = harness().await;
    let ana = identity("ana");
    let bia = identity("bia");

    let (left, right) = tokio::join!(
        run_as_actor(
            request_context("ana"),
            harness
                .records
                .create_record(&ana, "Expense", json!({"id": "e-ana"})),
        ),
        run_as_actor(
            request_context("bia"),
            harness
                .records
                .create_record(&bia, "Expense", json!({"id": "e-bia"})),
        ),
    );
    assert!(left.is_ok());
    assert!(right.is_ok());

    for record in harness.audit_log.records().await {
        let expected = record.entity_id.trim_start_matches("e-").to_owned();
        assert_eq!(record.actor_id, Some(expected));
    }
}

#[tokio::test]
async fn spawned_work_is_attributed_to_the_spawning_actor() {
    let harness = harness().await;
    let records = harness.records.clone();

    let joined = run_as_actor(request_context("ana"), async move {
        spawn_with_actor(async move {
            records
                .create_record(&identity("ana"), "ExpenseCategory", json!({"id": "c1"}))
                .await
        })
        .await
    })
    .await;
    assert!(matches!(joined, Ok(Ok(_))));

    let stored = harness.audit_log.records().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].actor_id.as_deref(), Some("ana"));
}

#[tokio::test]
async fn reads_are_never_recorded() {
    let harness = harness().await;
    let ana = identity("ana");

    let listed = harness
        .records
        .list_records(
            &ana,
            "Vendor",
            EntityListQuery {
                limit: 10,
                offset: 0,
                filter: None,
            },
        )
        .await;
    assert!(listed.is_ok());

    let fetched = harness.records.get_record(&ana, "Vendor", "v1").await;
    assert!(matches!(fetched, Err(AppError::NotFound(_))));
    assert!(harness.audit_log.records().await.is_empty());
}

#[tokio::test]
async fn audit_log_lists_newest_first_with_filters() {
    let audit_log = InMemoryAuditLog::new();
    for (entity_id, minutes) in [("v1", 0), ("v2", 10), ("v1", 5)] {
        let inserted = audit_log.insert(record_at(entity_id, minutes)).await;
        assert!(inserted.is_ok());
    }

    let all = audit_log
        .list_records(AuditLogQuery {
            limit: 10,
            ..AuditLogQuery::default()
        })
        .await
        .unwrap_or_default();
    let ordered: Vec<_> = all.iter().map(|entry| entry.at.as_str()).collect();
    assert_eq!(
        ordered,
        vec![
            "2025-03-01T12:10:00Z",
            "2025-03-01T12:05:00Z",
            "2025-03-01T12:00:00Z"
        ]
    );

    let filtered = audit_log
        .list_records(AuditLogQuery {
            limit: 10,
            entity_id: Some("v1".to_owned()),
            action: Some(AuditAction::Updated),
            ..AuditLogQuery::default()
        })
        .await
        .unwrap_or_default();
    assert_eq!(filtered.len(), 2);
    assert!(filtered.iter().all(|entry| entry.entity_id == "v1"));

    let paged = audit_log
        .list_records(AuditLogQuery {
            limit: 1,
            offset: 1,
            ..AuditLogQuery::default()
        })
        .await
        .unwrap_or_default();
    assert_eq!(paged.len(), 1);
    assert_eq!(paged[0].at, "2025-03-01T12:05:00Z");
}

#[tokio::test]
async fn audit_log_requires_audit_permission() {
    let harness = harness().await;

    let denied = harness
        .audit
        .list_records(&identity("bia"), AuditLogQuery::default())
        .await;
    assert!(matches!(denied, Err(AppError::Forbidden(_))));

    let allowed = harness
        .audit
        .list_records(&identity("ana"), AuditLogQuery::default())
        .await;
    assert!(allowed.is_ok());
}
