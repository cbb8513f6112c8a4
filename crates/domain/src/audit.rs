use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use fincontrol_core::AppError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::RedactionPolicy;

/// Entity id recorded when neither snapshot carries an identifier.
pub const UNKNOWN_ENTITY_ID: &str = "(unknown)";

/// Entity name of the audit log itself. Never audited.
pub const AUDIT_LOG_ENTITY: &str = "AuditLog";

/// Timestamp field that marks a row as soft-deleted.
pub const SOFT_DELETE_FIELD: &str = "deletedAt";

/// Entity types whose mutations are captured into the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AuditedEntity {
    /// Back-office user accounts.
    User,
    /// Vendors and contacts.
    Vendor,
    /// Expense headers.
    Expense,
    /// Expense line items.
    ExpenseItem,
    /// Scheduled expense installments.
    ExpenseInstallment,
    /// Payments settled against an expense.
    ExpensePayment,
    /// Expense categories.
    ExpenseCategory,
    /// Financial accounts.
    Account,
}

impl AuditedEntity {
    /// Returns the stable entity type name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Vendor => "Vendor",
            Self::Expense => "Expense",
            Self::ExpenseItem => "ExpenseItem",
            Self::ExpenseInstallment => "ExpenseInstallment",
            Self::ExpensePayment => "ExpensePayment",
            Self::ExpenseCategory => "ExpenseCategory",
            Self::Account => "Account",
        }
    }

    /// Returns every audited entity type.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[AuditedEntity] = &[
            AuditedEntity::User,
            AuditedEntity::Vendor,
            AuditedEntity::Expense,
            AuditedEntity::ExpenseItem,
            AuditedEntity::ExpenseInstallment,
            AuditedEntity::ExpensePayment,
            AuditedEntity::ExpenseCategory,
            AuditedEntity::Account,
        ];

        ALL
    }
}

impl Display for AuditedEntity {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for AuditedEntity {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|entity| entity.as_str() == value)
            .ok_or_else(|| AppError::Validation(format!("unknown audited entity '{value}'")))
    }
}

/// Operation-kind tags supplied by the data access layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Single-row insert.
    Create,
    /// Single-row update by unique filter.
    Update,
    /// Single-row delete by unique filter.
    Delete,
    /// Insert-or-update by unique filter.
    Upsert,
    /// Multi-row insert.
    CreateMany,
    /// Multi-row update by filter.
    UpdateMany,
    /// Multi-row delete by filter.
    DeleteMany,
    /// Unique lookup.
    FindUnique,
    /// Unique lookup failing when absent.
    FindUniqueOrThrow,
    /// First match lookup.
    FindFirst,
    /// First match lookup failing when absent.
    FindFirstOrThrow,
    /// Listing.
    FindMany,
    /// Row count.
    Count,
    /// Aggregation.
    Aggregate,
    /// Grouped aggregation.
    GroupBy,
    /// Tag outside the known vocabulary.
    Other(String),
}

impl OperationKind {
    /// Parses a data-layer tag. Unknown tags are kept verbatim.
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "create" => Self::Create,
            "update" => Self::Update,
            "delete" => Self::Delete,
            "upsert" => Self::Upsert,
            "createMany" => Self::CreateMany,
            "updateMany" => Self::UpdateMany,
            "deleteMany" => Self::DeleteMany,
            "findUnique" => Self::FindUnique,
            "findUniqueOrThrow" => Self::FindUniqueOrThrow,
            "findFirst" => Self::FindFirst,
            "findFirstOrThrow" => Self::FindFirstOrThrow,
            "findMany" => Self::FindMany,
            "count" => Self::Count,
            "aggregate" => Self::Aggregate,
            "groupBy" => Self::GroupBy,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Returns the data-layer tag for this kind.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Upsert => "upsert",
            Self::CreateMany => "createMany",
            Self::UpdateMany => "updateMany",
            Self::DeleteMany => "deleteMany",
            Self::FindUnique => "findUnique",
            Self::FindUniqueOrThrow => "findUniqueOrThrow",
            Self::FindFirst => "findFirst",
            Self::FindFirstOrThrow => "findFirstOrThrow",
            Self::FindMany => "findMany",
            Self::Count => "count",
            Self::Aggregate => "aggregate",
            Self::GroupBy => "groupBy",
            Self::Other(tag) => tag.as_str(),
        }
    }

    /// Returns whether the kind only reads data.
    #[must_use]
    pub fn is_read(&self) -> bool {
        matches!(
            self,
            Self::FindUnique
                | Self::FindUniqueOrThrow
                | Self::FindFirst
                | Self::FindFirstOrThrow
                | Self::FindMany
                | Self::Count
                | Self::Aggregate
                | Self::GroupBy
        )
    }

    /// Returns whether the prior row must be fetched before the mutation runs.
    #[must_use]
    pub fn reads_prior_row(&self) -> bool {
        matches!(self, Self::Update | Self::Delete | Self::Upsert)
    }

    /// Returns whether the kind mutates rows selected by a filter.
    #[must_use]
    pub fn is_filtered_bulk(&self) -> bool {
        matches!(self, Self::UpdateMany | Self::DeleteMany)
    }

    /// Returns whether the kind yields a `{count}` summary instead of a row.
    #[must_use]
    pub fn is_bulk(&self) -> bool {
        matches!(self, Self::CreateMany | Self::UpdateMany | Self::DeleteMany)
    }

    /// Returns whether the returned row is the after-state of the mutation.
    #[must_use]
    pub fn returns_row(&self) -> bool {
        matches!(self, Self::Create | Self::Update | Self::Upsert)
    }
}

impl Display for OperationKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Semantic action label persisted on each audit record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AuditAction {
    /// A row was inserted.
    Created,
    /// A row was changed.
    Updated,
    /// A row was physically removed.
    Deleted,
    /// A row received its soft-delete timestamp.
    SoftDeleted,
    /// Rows were inserted in bulk.
    BulkCreated,
    /// Rows were changed in bulk.
    BulkUpdated,
    /// Rows were removed in bulk.
    BulkDeleted,
    /// Uppercased operation tag for kinds outside the known vocabulary.
    Other(String),
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Created => "CREATED",
            Self::Updated => "UPDATED",
            Self::Deleted => "DELETED",
            Self::SoftDeleted => "SOFT_DELETED",
            Self::BulkCreated => "BULK_CREATED",
            Self::BulkUpdated => "BULK_UPDATED",
            Self::BulkDeleted => "BULK_DELETED",
            Self::Other(value) => value.as_str(),
        }
    }

    /// Parses a stored action value.
    #[must_use]
    pub fn from_storage(value: &str) -> Self {
        match value {
            "CREATED" => Self::Created,
            "UPDATED" => Self::Updated,
            "DELETED" => Self::Deleted,
            "SOFT_DELETED" => Self::SoftDeleted,
            "BULK_CREATED" => Self::BulkCreated,
            "BULK_UPDATED" => Self::BulkUpdated,
            "BULK_DELETED" => Self::BulkDeleted,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl Display for AuditAction {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Derives the action label for a captured mutation.
#[must_use]
pub fn classify_action(
    kind: &OperationKind,
    before: Option<&Value>,
    after: Option<&Value>,
) -> AuditAction {
    match kind {
        OperationKind::Create => AuditAction::Created,
        OperationKind::Delete => AuditAction::Deleted,
        OperationKind::Update => {
            let was_marked = before.is_some_and(has_soft_delete_marker);
            let is_marked = after.is_some_and(has_soft_delete_marker);
            if !was_marked && is_marked {
                AuditAction::SoftDeleted
            } else {
                AuditAction::Updated
            }
        }
        OperationKind::Upsert => {
            if before.is_none() {
                AuditAction::Created
            } else {
                AuditAction::Updated
            }
        }
        OperationKind::CreateMany => AuditAction::BulkCreated,
        OperationKind::UpdateMany => AuditAction::BulkUpdated,
        OperationKind::DeleteMany => AuditAction::BulkDeleted,
        other => AuditAction::Other(other.as_str().to_uppercase()),
    }
}

/// Resolves the affected row id: after's id, then before's id, then the unknown marker.
#[must_use]
pub fn resolve_entity_id(before: Option<&Value>, after: Option<&Value>) -> String {
    after
        .and_then(row_id)
        .or_else(|| before.and_then(row_id))
        .unwrap_or_else(|| UNKNOWN_ENTITY_ID.to_owned())
}

fn row_id(row: &Value) -> Option<String> {
    match row.get("id")? {
        Value::String(value) => Some(value.clone()),
        Value::Number(value) => Some(value.to_string()),
        _ => None,
    }
}

fn has_soft_delete_marker(row: &Value) -> bool {
    row.get(SOFT_DELETE_FIELD)
        .is_some_and(|value| !value.is_null())
}

/// Activation switch, allow-list and redaction rules for change capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditPolicy {
    enabled: bool,
    entities: BTreeSet<AuditedEntity>,
    redaction: RedactionPolicy,
}

impl AuditPolicy {
    /// Creates a policy from explicit settings.
    #[must_use]
    pub fn new(
        enabled: bool,
        entities: impl IntoIterator<Item = AuditedEntity>,
        redaction: RedactionPolicy,
    ) -> Self {
        Self {
            enabled,
            entities: entities.into_iter().collect(),
            redaction,
        }
    }

    /// Creates a policy that never captures anything.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(false, [], RedactionPolicy::default())
    }

    /// Returns whether capture is active at all.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the redaction rules applied to snapshots.
    #[must_use]
    pub fn redaction(&self) -> &RedactionPolicy {
        &self.redaction
    }

    /// Returns whether a call on `entity` with `kind` must be captured.
    #[must_use]
    pub fn captures(&self, entity: &str, kind: &OperationKind) -> bool {
        if !self.enabled || kind.is_read() || entity == AUDIT_LOG_ENTITY {
            return false;
        }

        AuditedEntity::from_str(entity).is_ok_and(|entity| self.entities.contains(&entity))
    }
}

impl Default for AuditPolicy {
    fn default() -> Self {
        Self::new(
            true,
            AuditedEntity::all().iter().copied(),
            RedactionPolicy::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use serde_json::json;

    use super::{
        AUDIT_LOG_ENTITY, AuditAction, AuditPolicy, AuditedEntity, OperationKind,
        UNKNOWN_ENTITY_ID, classify_action, resolve_entity_id,
    };

    #[test]
    fn update_setting_deleted_at_is_soft_delete() {
        let before = json!({"status": "ACTIVE", "deletedAt": null});
        let after = json!({"status": "ACTIVE", "deletedAt": "2024-01-01"});

        let action = classify_action(&OperationKind::Update, Some(&before), Some(&after));
        assert_eq!(action, AuditAction::SoftDeleted);
    }

    #[test]
    fn update_of_already_soft_deleted_row_is_plain_update() {
        let before = json!({"name": "a", "deletedAt": "2024-01-01"});
        let after = json!({"name": "b", "deletedAt": "2024-01-01"});

        let action = classify_action(&OperationKind::Update, Some(&before), Some(&after));
        assert_eq!(action, AuditAction::Updated);
    }

    #[test]
    fn upsert_depends_on_prior_row() {
        let row = json!({"id": "1"});
        assert_eq!(
            classify_action(&OperationKind::Upsert, None, Some(&row)),
            AuditAction::Created
        );
        assert_eq!(
            classify_action(&OperationKind::Upsert, Some(&row), Some(&row)),
            AuditAction::Updated
        );
    }

    #[test]
    fn bulk_and_fallback_kinds_are_labelled() {
        assert_eq!(
            classify_action(&OperationKind::CreateMany, None, None),
            AuditAction::BulkCreated
        );
        assert_eq!(
            classify_action(&OperationKind::UpdateMany, None, None),
            AuditAction::BulkUpdated
        );
        assert_eq!(
            classify_action(&OperationKind::DeleteMany, None, None),
            AuditAction::BulkDeleted
        );
        assert_eq!(
            classify_action(&OperationKind::from_tag("executeRaw"), None, None).as_str(),
            "EXECUTERAW"
        );
    }

    #[test]
    fn entity_id_prefers_after_then_before() {
        let before = json!({"id": 7});
        let after = json!({"id": "exp-9"});

        assert_eq!(resolve_entity_id(Some(&before), Some(&after)), "exp-9");
        assert_eq!(resolve_entity_id(Some(&before), None), "7");
        let bulk_before = json!({"where": {"status": "DRAFT"}});
        let bulk_after = json!({"count": 2});
        assert_eq!(
            resolve_entity_id(Some(&bulk_before), Some(&bulk_after)),
            UNKNOWN_ENTITY_ID
        );
    }

    #[test]
    fn policy_skips_reads_unlisted_entities_and_audit_log() {
        let policy = AuditPolicy::new(
            true,
            [AuditedEntity::Expense],
            super::RedactionPolicy::default(),
        );

        assert!(policy.captures("Expense", &OperationKind::Update));
        assert!(!policy.captures("Expense", &OperationKind::FindMany));
        assert!(!policy.captures("Vendor", &OperationKind::Update));
        assert!(!policy.captures("Document", &OperationKind::Create));
        assert!(!policy.captures(AUDIT_LOG_ENTITY, &OperationKind::Create));
    }

    #[test]
    fn disabled_policy_captures_nothing() {
        let policy = AuditPolicy::disabled();
        assert!(!policy.captures("User", &OperationKind::Create));
    }

    #[test]
    fn audited_entity_parses_known_names_only() {
        assert_eq!(
            AuditedEntity::from_str("ExpensePayment").ok(),
            Some(AuditedEntity::ExpensePayment)
        );
        assert!(AuditedEntity::from_str("AuditLog").is_err());
    }

    #[test]
    fn action_storage_value_roundtrips() {
        for action in [AuditAction::SoftDeleted, AuditAction::BulkDeleted] {
            assert_eq!(AuditAction::from_storage(action.as_str()), action);
        }
    }
}
