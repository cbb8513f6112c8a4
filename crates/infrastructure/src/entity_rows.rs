//! Row-shape helpers shared by the entity repository adapters.

use fincontrol_core::{AppError, AppResult};
use serde_json::{Map, Value};
use uuid::Uuid;

pub(crate) fn filter_fields(filter: &Value) -> AppResult<&Map<String, Value>> {
    filter
        .as_object()
        .ok_or_else(|| AppError::Validation("filter must be a JSON object".to_owned()))
}

pub(crate) fn data_fields(data: Value) -> AppResult<Map<String, Value>> {
    match data {
        Value::Object(fields) => Ok(fields),
        _ => Err(AppError::Validation(
            "record data must be a JSON object".to_owned(),
        )),
    }
}

/// Returns the row id and the row with its `id` field populated.
///
/// Rows without an id receive a random UUID.
pub(crate) fn prepare_insert(data: Value) -> AppResult<(String, Value)> {
    let mut fields = data_fields(data)?;
    let id = match fields.get("id") {
        Some(Value::String(id)) if !id.trim().is_empty() => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        Some(_) => {
            return Err(AppError::Validation(
                "record id must be a non-empty string or a number".to_owned(),
            ));
        }
        None => {
            let id = Uuid::new_v4().to_string();
            fields.insert("id".to_owned(), Value::String(id.clone()));
            id
        }
    };

    Ok((id, Value::Object(fields)))
}

/// Returns the textual form of a stored id value.
pub(crate) fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}
