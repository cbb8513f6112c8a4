use async_trait::async_trait;
use chrono::SecondsFormat;
use tokio::sync::RwLock;
use uuid::Uuid;

use fincontrol_application::{
    AuditLogEntry, AuditLogQuery, AuditLogRepository, AuditRecord, AuditRecordStore,
};
use fincontrol_core::AppResult;

/// In-memory audit log serving both the write and the read side.
#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    records: RwLock<Vec<(Uuid, AuditRecord)>>,
}

impl InMemoryAuditLog {
    /// Creates an empty audit log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }

    /// Returns every stored record in insertion order.
    pub async fn records(&self) -> Vec<AuditRecord> {
        self.records
            .read()
            .await
            .iter()
            .map(|(_, record)| record.clone())
            .collect()
    }
}

fn matches(record: &AuditRecord, query: &AuditLogQuery) -> bool {
    query
        .entity
        .as_deref()
        .is_none_or(|entity| record.entity == entity)
        && query
            .entity_id
            .as_deref()
            .is_none_or(|entity_id| record.entity_id == entity_id)
        && query
            .action
            .as_ref()
            .is_none_or(|action| record.action == *action)
        && query
            .actor_id
            .as_deref()
            .is_none_or(|actor_id| record.actor_id.as_deref() == Some(actor_id))
}

#[async_trait]
impl AuditRecordStore for InMemoryAuditLog {
    async fn insert(&self, record: AuditRecord) -> AppResult<()> {
        self.records.write().await.push((Uuid::new_v4(), record));
        Ok(())
    }
}

#[async_trait]
impl AuditLogRepository for InMemoryAuditLog {
    async fn list_records(&self, query: AuditLogQuery) -> AppResult<Vec<AuditLogEntry>> {
        let query = query.clamped();
        let records = self.records.read().await;

        // Insertion order breaks ties between records captured in the same instant.
        let mut ordered: Vec<_> = records.iter().enumerate().collect();
        ordered.sort_by(|(left_index, (_, left)), (right_index, (_, right))| {
            right.at.cmp(&left.at).then(right_index.cmp(left_index))
        });

        Ok(ordered
            .into_iter()
            .map(|(_, entry)| entry)
            .filter(|(_, record)| matches(record, &query))
            .skip(query.offset)
            .take(query.limit)
            .map(|(record_id, record)| AuditLogEntry {
                record_id: record_id.to_string(),
                entity: record.entity.clone(),
                entity_id: record.entity_id.clone(),
                action: record.action.clone(),
                actor_id: record.actor_id.clone(),
                ip: record.ip.clone(),
                user_agent: record.user_agent.clone(),
                diff: record.diff.clone(),
                at: record.at.to_rfc3339_opts(SecondsFormat::Secs, true),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests;
