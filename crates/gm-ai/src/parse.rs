//! Lenient decoding of structured generation output.

use crate::backend::GenerationError;
use gm_core::lenient::{as_deltas, as_i64, as_text};
use gm_core::{AnalystResult, Attributes, GameOption, MAX_OPTIONS};
use serde_json::{Map, Value};

/// Parse the first JSON object in `raw`, tolerating markdown code fences and
/// prose around it.
pub fn extract_json_object(raw: &str) -> Result<Map<String, Value>, GenerationError> {
    let trimmed = strip_fences(raw.trim());
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) {
        return Ok(map);
    }
    let start = trimmed.find('{');
    let end = trimmed.rfind('}');
    match (start, end) {
        (Some(s), Some(e)) if s < e => match serde_json::from_str::<Value>(&trimmed[s..=e]) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(GenerationError::MalformedJson("expected a JSON object".into())),
            Err(err) => Err(GenerationError::MalformedJson(err.to_string())),
        },
        _ => Err(GenerationError::MalformedJson("no JSON object in output".into())),
    }
}

fn strip_fences(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // drop the language tag line
    let rest = rest.find('\n').map(|i| &rest[i + 1..]).unwrap_or(rest);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn field<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| map.get(*k)).filter(|v| !v.is_null())
}

fn text_field(map: &Map<String, Value>, keys: &[&str]) -> String {
    field(map, keys).and_then(as_text).unwrap_or_default()
}

/// Analyst output. `valid` defaults to true when the model omits it.
pub fn analyst_from_value(map: &Map<String, Value>) -> AnalystResult {
    let valid = match field(map, &["valid", "is_valid"]) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.trim().eq_ignore_ascii_case("false"),
        _ => true,
    };
    AnalystResult {
        valid,
        logic_chain: text_field(map, &["logicChain", "logic_chain", "system_note"]),
        attribute_changes: field(map, &["attributeChanges", "attribute_changes"])
            .map(as_deltas)
            .unwrap_or_default(),
        event_summary: text_field(map, &["eventSummary", "event_summary"]),
        error: None,
    }
}

/// Options from any of the keys generators use, truncated to [`MAX_OPTIONS`].
/// Entries without a label are dropped; missing ids are filled by position.
pub fn options_from_value(map: &Map<String, Value>) -> Vec<GameOption> {
    let Some(Value::Array(items)) = field(
        map,
        &[
            "options",
            "nextOptions",
            "next_options",
            "currentOptions",
            "firstOptions",
            "first_options",
        ],
    ) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| serde_json::from_value::<GameOption>(item.clone()).ok())
        .filter(|opt| !opt.label.trim().is_empty())
        .take(MAX_OPTIONS)
        .enumerate()
        .map(|(i, mut opt)| {
            if opt.id.trim().is_empty() {
                opt.id = (i + 1).to_string();
            }
            opt
        })
        .collect()
}

/// Narration plus options. Any numeric changes in the payload are ignored.
pub fn narrative_from_value(map: &Map<String, Value>) -> String {
    text_field(map, &["narrative", "story", "text"])
}

/// Numeric attributes from a setup payload; non-numeric values are skipped.
/// Keys are matched to the schema when the snapshot is seeded.
pub fn attributes_from_value(value: &Value) -> Attributes {
    match value {
        Value::Object(map) => map
            .iter()
            .filter_map(|(k, v)| as_i64(v).map(|n| (k.clone(), n)))
            .collect(),
        _ => Attributes::new(),
    }
}

/// A field that must be a non-empty object or string to count as present.
pub fn present(map: &Map<String, Value>, keys: &[&str]) -> Option<Value> {
    field(map, keys)
        .filter(|v| match v {
            Value::Object(m) => !m.is_empty(),
            Value::String(s) => !s.trim().is_empty(),
            _ => false,
        })
        .cloned()
}
