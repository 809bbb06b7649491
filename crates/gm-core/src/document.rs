//! Round documents: the unit of persistence.

use crate::attributes::Attributes;
use crate::history::HistoryLog;
use crate::lenient;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Upper bound on the follow-up options offered to the next actor.
pub const MAX_OPTIONS: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerKind {
    Human,
    Ai,
}

/// A participant listed in the document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PlayerKind,
    pub position: String,
}

/// A candidate directive offered to the next actor. Advisory only.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameOption {
    #[serde(default, deserialize_with = "lenient::text")]
    pub id: String,
    #[serde(deserialize_with = "lenient::text")]
    pub label: String,
    #[serde(default, alias = "desc", deserialize_with = "lenient::text")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub cost: Option<i64>,
    #[serde(default, alias = "cost_description", deserialize_with = "lenient::text")]
    pub cost_description: String,
    #[serde(default, alias = "predicted_effect", deserialize_with = "lenient::text")]
    pub predicted_effect: String,
    /// Fields such as `effects` that options may carry; kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GameOption {
    pub fn new(id: &str, label: &str, description: &str, predicted_effect: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            description: description.to_string(),
            predicted_effect: predicted_effect.to_string(),
            ..Self::default()
        }
    }
}

/// Complete game state after one round.
///
/// Keys this type does not model are kept in `extra` and written back
/// unchanged, so stores never drop fields they do not understand.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundDocument {
    pub game_id: String,
    pub round_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    pub turn: u64,
    pub attributes: Attributes,
    #[serde(default)]
    pub history: HistoryLog,
    #[serde(default)]
    pub current_options: Vec<GameOption>,
    #[serde(default)]
    pub passive_rules: Value,
    #[serde(default)]
    pub formulas: Value,
    #[serde(default)]
    pub players: Vec<Player>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RoundDocument {
    /// The document that follows this one: `roundId` and `turn` advance by
    /// one and every carried-over field is copied.
    pub fn successor(
        &self,
        attributes: Attributes,
        history: HistoryLog,
        current_options: Vec<GameOption>,
    ) -> RoundDocument {
        RoundDocument {
            game_id: self.game_id.clone(),
            round_id: self.round_id + 1,
            company_name: self.company_name.clone(),
            turn: self.turn + 1,
            attributes,
            history,
            current_options,
            passive_rules: self.passive_rules.clone(),
            formulas: self.formulas.clone(),
            players: self.players.clone(),
            extra: self.extra.clone(),
        }
    }
}
