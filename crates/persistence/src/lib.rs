#![deny(warnings)]

//! Persistence layer: append-only storage of round documents.
//!
//! Every store keeps the full timeline of a game and answers "latest" with the
//! document holding the highest `roundId`. Documents are written whole; no
//! store ever edits a stored document in place.

use async_trait::async_trait;
use gm_core::RoundDocument;
use thiserror::Error;

mod file;
mod memory;
mod sqlite;

pub use file::LocalFileStore;
pub use memory::MemoryStore;
pub use sqlite::{init_db, SqliteStore};

/// Errors surfaced by stores. Connectivity problems are reported, never
/// masked as "no document".
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("document serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Get/put interface over the latest round document of each game.
#[async_trait]
pub trait RoundStore: Send + Sync {
    /// Short backend name for logs and status output.
    fn name(&self) -> &'static str;

    /// The document with the highest `roundId` for `game_id`, if any.
    async fn pull_latest(&self, game_id: &str) -> Result<Option<RoundDocument>, StoreError>;

    /// Insert a new document. Existing documents are never modified.
    async fn push_new(&self, doc: &RoundDocument) -> Result<(), StoreError>;
}

/// Returns the default SQLite URL used for the document table.
pub fn default_sqlite_url() -> &'static str {
    "sqlite://./saves/rounds.db"
}

/// Returns the default path of the local JSON store.
pub fn default_local_path() -> &'static str {
    "./saves/local_game_data.json"
}

/// Index of the latest document in a timeline: highest round id, later
/// insertions winning ties.
pub(crate) fn latest_index(docs: &[RoundDocument]) -> Option<usize> {
    docs.iter()
        .enumerate()
        .max_by_key(|(idx, d)| (d.round_id, *idx))
        .map(|(idx, _)| idx)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use gm_core::{AttributeSchema, HistoryEntry, HistoryLog, RoundDocument};
    use serde_json::{json, Map};

    pub fn doc(game_id: &str, round_id: u64) -> RoundDocument {
        RoundDocument {
            game_id: game_id.to_string(),
            round_id,
            company_name: Some("Nexus Corp".to_string()),
            turn: round_id,
            attributes: AttributeSchema::default().initial_snapshot(),
            history: HistoryLog::new().append([HistoryEntry::system(None, format!("round {round_id}"))]),
            current_options: vec![],
            passive_rules: json!({"income_base": 100, "expense_base": 50}),
            formulas: json!("Cash_Next = Cash - 50 + Action_Effect"),
            players: vec![],
            extra: Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_is_sqlite() {
        assert!(default_sqlite_url().starts_with("sqlite://"));
    }

    #[test]
    fn latest_prefers_round_then_insertion_order() {
        let docs = vec![
            fixtures::doc("g", 1),
            fixtures::doc("g", 3),
            fixtures::doc("g", 2),
            fixtures::doc("g", 3),
        ];
        assert_eq!(latest_index(&docs), Some(3));
        assert_eq!(latest_index(&[]), None);
    }
}
