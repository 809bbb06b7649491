#![deny(warnings)]

//! Round resolution for the game master.
//!
//! A round starts from the latest stored document. The acting player is
//! resolved first (analyst, then narrator); if that player holds the primary
//! role every AI subordinate follows, and all outcomes are folded into the
//! next document in roster order before it is persisted. [`GameMaster`]
//! runs this either as one call or as a stream of [`StreamEvent`]s.

pub mod config;
pub mod error;
pub mod events;
pub mod master;
pub mod protocol;
pub mod scheduler;

pub use config::{AiDispatch, RuntimeConfig};
pub use error::RuntimeError;
pub use events::{EventSink, StreamEvent};
pub use master::{ActionReport, GameMaster, PlayerAction};
pub use protocol::{resolve_actor, ActorOutcome, RoundState, TurnStage};
pub use scheduler::ActorScheduler;
