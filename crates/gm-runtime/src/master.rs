//! Orchestration of whole rounds: init, synchronous actions and streamed
//! actions.

use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::events::{EventSink, StreamEvent};
use crate::protocol::{decision_text, resolve_actor, RoundState, TurnStage};
use crate::scheduler::ActorScheduler;
use futures::StreamExt;
use gm_ai::stages;
use gm_ai::GenerationBackend;
use gm_core::directive;
use gm_core::{
    diff, validate_document, Deltas, GameOption, HistoryEntry, HistoryLog, Role, RoundDocument,
    DEFAULT_GAME_ID, DEGRADED_PREFIX,
};
use persistence::RoundStore;
use serde::{Deserialize, Serialize};
use serde_json::Map;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A directive submitted by a client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlayerAction {
    /// Chosen option label, or the custom-directive sentinel.
    pub label: String,
    pub custom_text: Option<String>,
    pub game_id: String,
    pub player_id: String,
    pub player_position: String,
}

impl Default for PlayerAction {
    fn default() -> Self {
        Self {
            label: String::new(),
            custom_text: None,
            game_id: DEFAULT_GAME_ID.to_string(),
            player_id: "player_human".to_string(),
            player_position: "ceo".to_string(),
        }
    }
}

impl PlayerAction {
    pub fn directive(&self) -> String {
        directive::compose(&self.label, self.custom_text.as_deref())
    }
}

/// Result of a synchronous action.
#[derive(Clone, Debug, PartialEq)]
pub struct ActionReport {
    pub document: RoundDocument,
    /// Net change over the whole round.
    pub deltas: Deltas,
    pub event_summary: String,
}

/// One game master per request: the backend carries the caller's
/// credential and the store is whatever the server currently points at.
#[derive(Clone)]
pub struct GameMaster {
    backend: Arc<dyn GenerationBackend>,
    store: Arc<dyn RoundStore>,
    config: Arc<RuntimeConfig>,
}

impl GameMaster {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        store: Arc<dyn RoundStore>,
        config: Arc<RuntimeConfig>,
    ) -> Self {
        Self {
            backend,
            store,
            config,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Create round 1 of `game_id` from generated setup and persist it.
    pub async fn init(&self, game_id: &str, settings: &str) -> Result<RoundDocument, RuntimeError> {
        let cfg = &*self.config;
        let setup = stages::setup(
            self.backend.as_ref(),
            &cfg.limits,
            settings,
            &cfg.schema,
            &cfg.setup,
        )
        .await;
        let doc = RoundDocument {
            game_id: game_id.to_string(),
            round_id: 1,
            company_name: Some(cfg.company_name.clone()),
            turn: 1,
            attributes: setup.attributes,
            history: HistoryLog::new().append([HistoryEntry::system(None, setup.narrative)]),
            current_options: setup.options,
            passive_rules: setup.passive_rules,
            formulas: setup.formulas,
            players: cfg.roster.players(),
            extra: Map::new(),
        };
        validate_document(&doc, &cfg.schema)?;
        self.store.push_new(&doc).await?;
        info!(game_id, store = self.store.name(), degraded = setup.degraded, "game initialised");
        Ok(doc)
    }

    /// Latest document of `game_id`.
    pub async fn load(&self, game_id: &str) -> Result<RoundDocument, RuntimeError> {
        self.store
            .pull_latest(game_id)
            .await?
            .ok_or_else(|| RuntimeError::NotFound(game_id.to_string()))
    }

    /// Load the game named by `action` and resolve it synchronously.
    pub async fn act(&self, action: &PlayerAction) -> Result<ActionReport, RuntimeError> {
        let doc = self.load(&action.game_id).await?;
        self.act_on(&doc, action).await
    }

    /// Resolve a round on top of `doc` and persist the result.
    pub async fn act_on(
        &self,
        doc: &RoundDocument,
        action: &PlayerAction,
    ) -> Result<ActionReport, RuntimeError> {
        let cfg = &*self.config;
        let backend = self.backend.as_ref();
        let role = cfg
            .roster
            .resolve(&action.player_position, &action.player_id);
        let directive = action.directive();
        info!(game_id = %doc.game_id, round_id = doc.round_id, position = %role.position, "resolving action");

        let mut state = RoundState::from_document(doc);
        let outcome = {
            let view = state.view(doc, cfg.history_window);
            resolve_actor(backend, &cfg.limits, &view, &role, &directive).await
        };
        state.fold(&cfg.schema, outcome);

        let scheduler = ActorScheduler::new(backend, cfg);
        let followers = scheduler.followers(&role.position);
        scheduler.run(doc, &mut state, &followers).await;

        let event_summary = state.event_summary();
        let next = state.into_successor(doc);
        self.persist(&next).await?;
        Ok(ActionReport {
            deltas: diff(&doc.attributes, &next.attributes),
            document: next,
            event_summary,
        })
    }

    async fn persist(&self, doc: &RoundDocument) -> Result<(), RuntimeError> {
        debug!(game_id = %doc.game_id, round_id = doc.round_id, stage = %TurnStage::Persist, "persisting round");
        validate_document(doc, &self.config.schema)?;
        self.store.push_new(doc).await?;
        info!(game_id = %doc.game_id, round_id = doc.round_id, store = self.store.name(), "round persisted");
        Ok(())
    }

    /// Resolve a round on top of `doc`, reporting progress through `sink`.
    ///
    /// Actors are resolved strictly in order and only prose is streamed;
    /// options come from one structured call after the last actor. Exactly
    /// one `done` event ends the stream, even when persisting fails. If the
    /// client goes away nothing is persisted and `Disconnected` is returned.
    pub async fn stream_on(
        &self,
        doc: &RoundDocument,
        action: &PlayerAction,
        sink: &EventSink,
    ) -> Result<RoundDocument, RuntimeError> {
        let cfg = &*self.config;
        let backend = self.backend.as_ref();
        let role = cfg
            .roster
            .resolve(&action.player_position, &action.player_id);
        info!(game_id = %doc.game_id, round_id = doc.round_id, position = %role.position, "streaming action");

        let mut actors: Vec<(Role, Option<String>)> = vec![(role.clone(), Some(action.directive()))];
        let scheduler = ActorScheduler::new(backend, cfg);
        actors.extend(
            scheduler
                .followers(&role.position)
                .into_iter()
                .map(|r| (r.clone(), None)),
        );

        let mut state = RoundState::from_document(doc);
        let mut latest_narrative = String::new();
        for (actor, directive) in &actors {
            latest_narrative = self
                .stream_actor(doc, &mut state, actor, directive.clone(), sink)
                .await?;
        }

        sink.emit(StreamEvent::log("Drafting the next options...")).await?;
        debug!(game_id = %doc.game_id, stage = %TurnStage::Options, "generating options");
        let primary = cfg
            .roster
            .role(&cfg.roster.primary)
            .cloned()
            .unwrap_or_else(|| role.clone());
        let options: Vec<GameOption> = {
            let view = state.view(doc, cfg.history_window);
            stages::next_options(backend, &cfg.limits, &view, &primary, &latest_narrative).await
        };
        if !options.is_empty() {
            state.options = Some(options);
        }
        if sink.is_closed() {
            warn!(game_id = %doc.game_id, "client disconnected before persist; dropping round");
            return Err(RuntimeError::Disconnected);
        }

        let event_summary = state.event_summary();
        let next = state.into_successor(doc);
        let persisted = match self.persist(&next).await {
            Ok(()) => true,
            Err(e) => {
                warn!(game_id = %doc.game_id, round_id = next.round_id, error = %e, "persist failed");
                false
            }
        };
        sink.emit(StreamEvent::Done {
            deltas: diff(&doc.attributes, &next.attributes),
            state: Box::new(next.clone()),
            event_summary,
            persisted,
        })
        .await?;
        Ok(next)
    }

    /// One actor's turn in streaming mode. Returns the narration text.
    async fn stream_actor(
        &self,
        doc: &RoundDocument,
        state: &mut RoundState,
        role: &Role,
        directive: Option<String>,
        sink: &EventSink,
    ) -> Result<String, RuntimeError> {
        let cfg = &*self.config;
        let backend = self.backend.as_ref();
        let directive = match directive {
            Some(d) => d,
            None => {
                sink.emit(StreamEvent::log(format!("{} is deciding...", role.label)))
                    .await?;
                let view = state.view(doc, cfg.history_window);
                let d = stages::decide(backend, &cfg.limits, &view, role).await;
                sink.emit(StreamEvent::Player {
                    text: decision_text(role, &d),
                })
                .await?;
                d
            }
        };

        sink.emit(StreamEvent::log(format!("Analyzing the {} directive...", role.label)))
            .await?;
        debug!(game_id = %doc.game_id, position = %role.position, stage = %TurnStage::Analyze, "streaming actor");
        let analysis = {
            let view = state.view(doc, cfg.history_window);
            stages::analyze(backend, &cfg.limits, &view, role, &directive).await
        };
        // the narrator sees the same state the analyst judged
        let before = state.clone();
        let applied = state.apply_analysis(&cfg.schema, &analysis);
        sink.emit(StreamEvent::Delta { data: applied }).await?;
        if !analysis.logic_chain.trim().is_empty() {
            sink.emit(StreamEvent::Thought {
                content: format!("[{}] {}", role.label, analysis.logic_chain),
            })
            .await?;
        }

        let stream_id = format!("{}-{}", doc.round_id + 1, role.position);
        sink.emit(StreamEvent::NarrativeBegin {
            stream_id: stream_id.clone(),
            actor: role.label.clone(),
        })
        .await?;

        let narrative = match analysis.failure_narrative() {
            Some(text) => {
                sink.emit(StreamEvent::Token {
                    content: text.clone(),
                    stream_id,
                })
                .await?;
                text
            }
            None => {
                let view = before.view(doc, cfg.history_window);
                debug!(game_id = %doc.game_id, position = %role.position, stage = %TurnStage::Narrate, "streaming prose");
                self.stream_prose(&view, role, &directive, &analysis, &stream_id, sink)
                    .await?
            }
        };

        state.record(role, &directive, &narrative, &analysis.logic_chain, Vec::new());
        Ok(narrative)
    }

    async fn stream_prose(
        &self,
        view: &gm_ai::TurnView<'_>,
        role: &Role,
        directive: &str,
        analysis: &gm_core::AnalystResult,
        stream_id: &str,
        sink: &EventSink,
    ) -> Result<String, RuntimeError> {
        let cfg = &*self.config;
        let mut text = String::new();
        let started =
            stages::stream_prose(self.backend.as_ref(), &cfg.limits, view, role, directive, analysis)
                .await;
        let failure = match started {
            Err(e) => Some(format!("{DEGRADED_PREFIX}{e}")),
            Ok(mut tokens) => {
                let mut failure = None;
                while let Some(item) = tokens.next().await {
                    match item {
                        Ok(fragment) => {
                            text.push_str(&fragment);
                            sink.emit(StreamEvent::Token {
                                content: fragment,
                                stream_id: stream_id.to_string(),
                            })
                            .await?;
                        }
                        Err(e) => {
                            failure = Some(format!("{DEGRADED_PREFIX}narration interrupted: {e}"));
                            break;
                        }
                    }
                }
                if failure.is_none() && text.trim().is_empty() {
                    failure = Some(format!("{DEGRADED_PREFIX}empty narration"));
                }
                failure
            }
        };
        if let Some(marker) = failure {
            warn!(game_id = view.game_id, position = %role.position, stage = "narrate", error = %marker, "narration degraded");
            let content = if text.is_empty() { marker } else { format!("\n{marker}") };
            text.push_str(&content);
            sink.emit(StreamEvent::Token {
                content,
                stream_id: stream_id.to_string(),
            })
            .await?;
        }
        Ok(text)
    }
}
