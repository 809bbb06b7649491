#![deny(warnings)]

//! Text generation for the game master.
//!
//! [`GenerationBackend`] is the only seam to a model. On top of it sit the
//! stage functions (setup, analyst, narrator, options, decision) which own
//! prompt construction and lenient parsing, and which turn every backend
//! failure into a degraded value instead of an error.

pub mod backend;
pub mod omen;
pub mod openai;
pub mod parse;
pub mod prompts;
pub mod scripted;
pub mod stages;

pub use backend::{CompletionRequest, GenerationBackend, GenerationError, Purpose, TextStream};
pub use openai::{BackendConfig, OpenAiBackend};
pub use scripted::{Reply, ScriptedBackend};
pub use stages::{InitialSetup, SetupDefaults, StageLimit, StageLimits, TurnView};
