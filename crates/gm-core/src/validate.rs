use crate::attributes::AttributeSchema;
use crate::document::{RoundDocument, MAX_OPTIONS};
use thiserror::Error;

/// Structural problems in a round document.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("game id must not be empty")]
    EmptyGameId,
    /// Round and turn counters start at 1.
    #[error("{field} must be >= 1")]
    CounterBelowOne { field: &'static str },
    #[error("attribute {key}={value} is outside [{min}, {max}]")]
    AttributeOutOfRange {
        key: String,
        value: i64,
        min: i64,
        max: String,
    },
    /// History ids must strictly increase.
    #[error("history id {id} does not follow {previous}")]
    HistoryOrder { previous: u64, id: u64 },
    #[error("{0} options exceed the limit of {}", MAX_OPTIONS)]
    TooManyOptions(usize),
}

/// Validate a round document against its attribute schema.
pub fn validate_document(
    doc: &RoundDocument,
    schema: &AttributeSchema,
) -> Result<(), ValidationError> {
    if doc.game_id.trim().is_empty() {
        return Err(ValidationError::EmptyGameId);
    }
    if doc.round_id == 0 {
        return Err(ValidationError::CounterBelowOne { field: "roundId" });
    }
    if doc.turn == 0 {
        return Err(ValidationError::CounterBelowOne { field: "turn" });
    }
    for (key, &value) in &doc.attributes {
        if schema.clamp(key, value) != value {
            let (min, max) = match schema.spec(key) {
                Some(spec) => (spec.min, spec.max),
                None => (0, None),
            };
            return Err(ValidationError::AttributeOutOfRange {
                key: key.clone(),
                value,
                min,
                max: max.map(|m| m.to_string()).unwrap_or_else(|| "inf".into()),
            });
        }
    }
    let mut previous: Option<u64> = None;
    for entry in doc.history.entries() {
        if let Some(prev) = previous {
            if entry.id <= prev {
                return Err(ValidationError::HistoryOrder {
                    previous: prev,
                    id: entry.id,
                });
            }
        }
        previous = Some(entry.id);
    }
    if doc.current_options.len() > MAX_OPTIONS {
        return Err(ValidationError::TooManyOptions(doc.current_options.len()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{HistoryEntry, HistoryLog};
    use crate::GameOption;
    use serde_json::{Map, Value};

    fn doc() -> RoundDocument {
        let schema = AttributeSchema::default();
        RoundDocument {
            game_id: "default_room".into(),
            round_id: 1,
            company_name: None,
            turn: 1,
            attributes: schema.initial_snapshot(),
            history: HistoryLog::new().append([HistoryEntry::system(None, "welcome")]),
            current_options: vec![GameOption::new("1", "Invest", "", "")],
            passive_rules: Value::Null,
            formulas: Value::Null,
            players: vec![],
            extra: Map::new(),
        }
    }

    #[test]
    fn fresh_document_is_valid() {
        assert_eq!(validate_document(&doc(), &AttributeSchema::default()), Ok(()));
    }

    #[test]
    fn rejects_out_of_range_attributes() {
        let mut d = doc();
        d.attributes.insert("morale".into(), 140);
        let err = validate_document(&d, &AttributeSchema::default()).unwrap_err();
        assert!(matches!(err, ValidationError::AttributeOutOfRange { ref key, .. } if key == "morale"));
    }

    #[test]
    fn rejects_zero_counters_and_option_overflow() {
        let schema = AttributeSchema::default();
        let mut d = doc();
        d.round_id = 0;
        assert_eq!(
            validate_document(&d, &schema),
            Err(ValidationError::CounterBelowOne { field: "roundId" })
        );
        let mut d = doc();
        d.current_options = vec![GameOption::default(); MAX_OPTIONS + 1];
        assert_eq!(
            validate_document(&d, &schema),
            Err(ValidationError::TooManyOptions(MAX_OPTIONS + 1))
        );
    }

    #[test]
    fn rejects_unordered_history() {
        let mut d = doc();
        let mut stale = HistoryEntry::system(None, "again");
        stale.id = 1;
        d.history = HistoryLog::from(vec![d.history.entries()[0].clone(), stale]);
        assert!(matches!(
            validate_document(&d, &AttributeSchema::default()),
            Err(ValidationError::HistoryOrder { previous: 1, id: 1 })
        ));
    }
}
