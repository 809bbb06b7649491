//! Append-only history of decisions and narration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Number of trailing entries surfaced to generation calls.
pub const HISTORY_WINDOW: usize = 30;

/// Role tag used in context lines for entries without an actor role.
const NARRATOR_TAG: &str = "NARRATOR";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Narration produced by the game master.
    System,
    /// A directive submitted by an actor.
    Player,
}

impl EntryKind {
    pub fn tag(self) -> &'static str {
        match self {
            EntryKind::System => "SYSTEM",
            EntryKind::Player => "PLAYER",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Assigned by [`HistoryLog::append`]; strictly increasing within a log.
    #[serde(default)]
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_role: Option<String>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logic_chain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Keys written by other clients, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HistoryEntry {
    /// A directive submitted by `actor_id` playing `role`.
    pub fn player(actor_id: &str, role: &str, text: impl Into<String>) -> Self {
        Self {
            id: 0,
            kind: EntryKind::Player,
            actor_id: Some(actor_id.to_string()),
            actor_role: Some(role.to_string()),
            text: text.into(),
            logic_chain: None,
            timestamp: None,
            extra: Map::new(),
        }
    }

    /// Narration for the turn of `role` (or general narration when `None`).
    pub fn system(role: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            id: 0,
            kind: EntryKind::System,
            actor_id: None,
            actor_role: role.map(str::to_string),
            text: text.into(),
            logic_chain: None,
            timestamp: None,
            extra: Map::new(),
        }
    }

    pub fn with_logic_chain(mut self, chain: &str) -> Self {
        if !chain.trim().is_empty() {
            self.logic_chain = Some(chain.to_string());
        }
        self
    }

    /// `[TYPE] ROLE: text`, the form entries take inside prompts.
    pub fn context_line(&self) -> String {
        let role = self
            .actor_role
            .as_deref()
            .map(str::to_uppercase)
            .unwrap_or_else(|| NARRATOR_TAG.to_string());
        format!("[{}] {}: {}", self.kind.tag(), role, self.text)
    }
}

/// Ordered history of a game. Appending yields a new log; existing entries
/// are never reordered or edited.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryLog(Vec<HistoryEntry>);

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Highest id in the log, 0 when empty.
    pub fn last_id(&self) -> u64 {
        self.0.iter().map(|e| e.id).max().unwrap_or(0)
    }

    /// Copy-on-append: returns a new log with `entries` added in order.
    ///
    /// Each appended entry gets the next id and, if it has none, the current
    /// time as its timestamp.
    pub fn append<I>(&self, entries: I) -> HistoryLog
    where
        I: IntoIterator<Item = HistoryEntry>,
    {
        let mut next_id = self.last_id() + 1;
        let now = Utc::now();
        let mut out = self.0.clone();
        for mut entry in entries {
            entry.id = next_id;
            next_id += 1;
            entry.timestamp.get_or_insert(now);
            out.push(entry);
        }
        HistoryLog(out)
    }

    /// The last `n` entries.
    pub fn recent(&self, n: usize) -> &[HistoryEntry] {
        let start = self.0.len().saturating_sub(n);
        &self.0[start..]
    }

    /// The last `n` entries rendered one per line for prompt context.
    pub fn recent_window(&self, n: usize) -> String {
        self.recent(n)
            .iter()
            .map(HistoryEntry::context_line)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl From<Vec<HistoryEntry>> for HistoryLog {
    fn from(entries: Vec<HistoryEntry>) -> Self {
        HistoryLog(entries)
    }
}
