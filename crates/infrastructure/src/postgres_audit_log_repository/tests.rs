use chrono::{Duration, Utc};
use serde_json::json;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use fincontrol_application::{AuditLogQuery, AuditLogRepository, AuditRecord, AuditRecordStore};
use fincontrol_domain::AuditAction;

use super::PostgresAuditLogRepository;
use crate::PostgresAuditRecordStore;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres audit log tests: {error}");
    }

    Some(pool)
}

fn record(entity_id: &str, action: AuditAction, minutes_ago: i64) -> AuditRecord {
    AuditRecord {
        entity: "Vendor".to_owned(),
        entity_id: entity_id.to_owned(),
        action,
        actor_id: Some("auditor".to_owned()),
        ip: Some("198.51.100.4".to_owned()),
        user_agent: Some("integration-test".to_owned()),
        diff: Some(json!({"name": {"before": "Acme", "after": "Acme Ltd"}})),
        at: Utc::now() - Duration::minutes(minutes_ago),
    }
}

#[tokio::test]
async fn stored_records_are_listed_newest_first() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let store = PostgresAuditRecordStore::new(pool.clone());
    let repository = PostgresAuditLogRepository::new(pool);
    let entity_id = format!("vendor-{}", Uuid::new_v4());

    for (action, minutes_ago) in [
        (AuditAction::Created, 30),
        (AuditAction::Updated, 20),
        (AuditAction::SoftDeleted, 10),
    ] {
        let inserted = store.insert(record(&entity_id, action, minutes_ago)).await;
        assert!(inserted.is_ok());
    }

    let listed = repository
        .list_records(AuditLogQuery {
            limit: 10,
            entity_id: Some(entity_id.clone()),
            ..AuditLogQuery::default()
        })
        .await;
    assert!(listed.is_ok());

    let entries = listed.unwrap_or_default();
    let actions: Vec<_> = entries.iter().map(|entry| entry.action.as_str()).collect();
    assert_eq!(actions, vec!["SOFT_DELETED", "UPDATED", "CREATED"]);
    assert!(entries.iter().all(|entry| entry.at.ends_with('Z')));
    assert_eq!(entries[0].ip.as_deref(), Some("198.51.100.4"));
    assert_eq!(
        entries[0].diff,
        Some(json!({"name": {"before": "Acme", "after": "Acme Ltd"}}))
    );
}

#[tokio::test]
async fn action_filter_narrows_results() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let store = PostgresAuditRecordStore::new(pool.clone());
    let repository = PostgresAuditLogRepository::new(pool);
    let entity_id = format!("vendor-{}", Uuid::new_v4());

    for (action, minutes_ago) in [(AuditAction::Created, 2), (AuditAction::Updated, 1)] {
        let inserted = store.insert(record(&entity_id, action, minutes_ago)).await;
        assert!(inserted.is_ok());
    }

    let listed = repository
        .list_records(AuditLogQuery {
            limit: 10,
            entity_id: Some(entity_id),
            action: Some(AuditAction::Created),
            ..AuditLogQuery::default()
        })
        .await
        .unwrap_or_default();

    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].action, AuditAction::Created);
}
