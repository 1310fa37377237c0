//! Flatten the response shapes memory services return into [`StoredMemory`].
//!
//! Services answer either with a bare JSON array or with an object wrapping
//! the array under `results`. Items are plain strings or objects holding the
//! text under `memory` (older services use `text`).

use serde_json::Value;
use tracing::debug;

use twinmem_core::{ProviderError, StoredMemory};

pub fn normalize_records(body: Value) -> Result<Vec<StoredMemory>, ProviderError> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("results") {
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(ProviderError::MalformedResponse(format!(
                    "'results' is {}, expected an array",
                    kind(&other)
                )));
            }
            None => {
                return Err(ProviderError::MalformedResponse(
                    "object without a 'results' array".to_string(),
                ));
            }
        },
        other => {
            return Err(ProviderError::MalformedResponse(format!(
                "top-level {}, expected an array or object",
                kind(&other)
            )));
        }
    };

    let total = items.len();
    let records: Vec<StoredMemory> = items.into_iter().filter_map(normalize_item).collect();
    if records.len() < total {
        debug!(
            skipped = total - records.len(),
            "dropped provider items without memory text"
        );
    }
    Ok(records)
}

fn normalize_item(item: Value) -> Option<StoredMemory> {
    match item {
        Value::String(text) => Some(StoredMemory::new(text)),
        Value::Object(mut map) => {
            let text = match map.remove("memory").or_else(|| map.remove("text")) {
                Some(Value::String(text)) => text,
                _ => return None,
            };
            let id = match map.remove("id") {
                Some(Value::String(id)) => Some(id),
                Some(Value::Number(id)) => Some(id.to_string()),
                _ => None,
            };
            let metadata = match map.remove("metadata") {
                Some(Value::Object(metadata)) => Some(metadata),
                _ => None,
            };
            Some(StoredMemory { text, id, metadata })
        }
        _ => None,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
