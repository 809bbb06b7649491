#![deny(warnings)]

//! Core domain model for the game master.
//!
//! This crate defines the serializable round document persisted after every
//! round, the attribute ledger that folds numeric deltas into it, the
//! append-only history log, and the actor roster. Everything here is pure:
//! generation and storage live in sibling crates.

pub mod attributes;
pub mod directive;
pub mod document;
pub mod history;
pub mod lenient;
pub mod resolution;
pub mod roster;
mod validate;

pub use attributes::{apply_deltas, diff, AttributeSchema, Attributes, Deltas, ResourceSpec};
pub use document::{GameOption, Player, PlayerKind, RoundDocument, MAX_OPTIONS};
pub use history::{EntryKind, HistoryEntry, HistoryLog, HISTORY_WINDOW};
pub use resolution::{AnalystResult, NarratorOutput, DEGRADED_PREFIX};
pub use roster::{Role, Roster};
pub use validate::{validate_document, ValidationError};

/// Game id used when a client does not name one.
pub const DEFAULT_GAME_ID: &str = "default_room";
