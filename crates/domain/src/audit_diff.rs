//! Before/after comparison for audit records.
//!
//! Snapshots are plain JSON values. Every snapshot is sanitized before it is
//! compared or emitted, so redacted fields never leave this module in
//! plaintext.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

/// Replacement value written in place of redacted fields.
pub const REDACTED_MARKER: &str = "[REDACTED]";

/// Field names redacted by every policy.
pub const DEFAULT_REDACTED_FIELDS: &[&str] = &["password", "passwordHash"];

/// Old and new value of one changed top-level field.
///
/// A side is `None` when the field is missing from that snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    /// Sanitized value before the mutation.
    pub before: Option<Value>,
    /// Sanitized value after the mutation.
    pub after: Option<Value>,
}

/// Minimal description of what a mutation changed.
#[derive(Debug, Clone, PartialEq)]
pub enum AuditDiff {
    /// No prior state: the full sanitized after-snapshot.
    Created {
        /// Sanitized after-snapshot.
        after: Value,
    },
    /// No resulting state: the full sanitized before-snapshot.
    Deleted {
        /// Sanitized before-snapshot.
        before: Value,
    },
    /// Only the top-level fields whose values differ.
    Changed(BTreeMap<String, FieldChange>),
    /// Non-object snapshots that differ as a whole.
    Replaced {
        /// Sanitized before value.
        before: Value,
        /// Sanitized after value.
        after: Value,
    },
}

impl AuditDiff {
    /// Renders the persisted JSON shape of the diff.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Created { after } => single_entry("after", after.clone()),
            Self::Deleted { before } => single_entry("before", before.clone()),
            Self::Replaced { before, after } => {
                let mut object = Map::new();
                object.insert("before".to_owned(), before.clone());
                object.insert("after".to_owned(), after.clone());
                Value::Object(object)
            }
            Self::Changed(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(field, change)| {
                        let mut entry = Map::new();
                        if let Some(before) = &change.before {
                            entry.insert("before".to_owned(), before.clone());
                        }
                        if let Some(after) = &change.after {
                            entry.insert("after".to_owned(), after.clone());
                        }
                        (field.clone(), Value::Object(entry))
                    })
                    .collect(),
            ),
        }
    }
}

fn single_entry(key: &str, value: Value) -> Value {
    let mut object = Map::new();
    object.insert(key.to_owned(), value);
    Value::Object(object)
}

/// Set of sensitive field names that are masked in every snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedactionPolicy {
    fields: BTreeSet<String>,
}

impl RedactionPolicy {
    /// Creates a policy redacting `DEFAULT_REDACTED_FIELDS` plus `extra`.
    ///
    /// The default fields cannot be removed.
    #[must_use]
    pub fn with_additional<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: DEFAULT_REDACTED_FIELDS
                .iter()
                .map(|field| (*field).to_owned())
                .chain(extra.into_iter().map(Into::into))
                .collect(),
        }
    }

    /// Returns whether values under `key` are masked.
    #[must_use]
    pub fn is_redacted(&self, key: &str) -> bool {
        self.fields.contains(key)
    }

    /// Returns the configured field names.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }

    /// Recursively masks redacted keys at any depth.
    #[must_use]
    pub fn sanitize(&self, value: &Value) -> Value {
        match value {
            Value::Object(object) => Value::Object(
                object
                    .iter()
                    .map(|(key, nested)| {
                        let sanitized = if self.is_redacted(key) {
                            Value::String(REDACTED_MARKER.to_owned())
                        } else {
                            self.sanitize(nested)
                        };
                        (key.clone(), sanitized)
                    })
                    .collect(),
            ),
            Value::Array(items) => {
                Value::Array(items.iter().map(|item| self.sanitize(item)).collect())
            }
            primitive => primitive.clone(),
        }
    }

    /// Compares two snapshots and returns `None` when nothing changed.
    #[must_use]
    pub fn diff(&self, before: Option<&Value>, after: Option<&Value>) -> Option<AuditDiff> {
        match (before, after) {
            (None, None) => None,
            (None, Some(after)) => Some(AuditDiff::Created {
                after: self.sanitize(after),
            }),
            (Some(before), None) => Some(AuditDiff::Deleted {
                before: self.sanitize(before),
            }),
            (Some(before), Some(after)) => {
                let before = self.sanitize(before);
                let after = self.sanitize(after);
                match (before, after) {
                    (Value::Object(before), Value::Object(after)) => {
                        let changes = changed_fields(&before, &after);
                        (!changes.is_empty()).then_some(AuditDiff::Changed(changes))
                    }
                    (before, after) => {
                        (before != after).then_some(AuditDiff::Replaced { before, after })
                    }
                }
            }
        }
    }
}

impl Default for RedactionPolicy {
    fn default() -> Self {
        Self::with_additional(std::iter::empty::<String>())
    }
}

fn changed_fields(
    before: &Map<String, Value>,
    after: &Map<String, Value>,
) -> BTreeMap<String, FieldChange> {
    let keys: BTreeSet<&String> = before.keys().chain(after.keys()).collect();

    keys.into_iter()
        .filter_map(|key| {
            let old = before.get(key);
            let new = after.get(key);
            (old != new).then(|| {
                (
                    key.clone(),
                    FieldChange {
                        before: old.cloned(),
                        after: new.cloned(),
                    },
                )
            })
        })
        .collect()
}
