//! Tolerant readers for values that arrive from generated JSON.
//!
//! Generated documents are structurally validated, not trusted: numbers may
//! come back as floats or numeric strings, and text fields may be numbers.

use crate::attributes::Deltas;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Read an integer from a JSON number or numeric string. Floats are rounded.
pub fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => {
            let t = s.trim().trim_start_matches('+');
            t.parse::<i64>()
                .ok()
                .or_else(|| t.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.round() as i64))
        }
        _ => None,
    }
}

/// Read text from a string, number or bool; arrays of strings are joined by newlines.
pub fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(as_text).collect();
            (!parts.is_empty()).then(|| parts.join("\n"))
        }
        _ => None,
    }
}

/// Read a sparse delta map, dropping entries that are not numeric. Keys keep
/// their spelling; matching against the schema happens when deltas are applied.
pub fn as_deltas(value: &Value) -> Deltas {
    let Some(map) = value.as_object() else {
        return Deltas::new();
    };
    map.iter()
        .filter_map(|(k, v)| as_i64(v).map(|n| (k.clone(), n)))
        .collect()
}

/// Serde adapter for optional integers written leniently.
pub fn opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(as_i64(&value))
}

/// Serde adapter for text fields that may arrive as other scalars or null.
pub fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(as_text(&value).unwrap_or_default())
}
