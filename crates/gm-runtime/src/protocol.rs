//! Two-phase resolution of one actor's turn and the fold of its outcome into
//! the round being built.

use gm_ai::stages;
use gm_ai::{GenerationBackend, StageLimits, TurnView};
use gm_core::{
    apply_deltas, diff, AnalystResult, AttributeSchema, Attributes, Deltas, GameOption,
    HistoryEntry, HistoryLog, NarratorOutput, Role, RoundDocument,
};
use std::fmt;
use tracing::debug;

/// Where an actor's turn is in the protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnStage {
    Analyze,
    Narrate,
    Options,
    Persist,
    Failed,
}

impl fmt::Display for TurnStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TurnStage::Analyze => "analyze",
            TurnStage::Narrate => "narrate",
            TurnStage::Options => "options",
            TurnStage::Persist => "persist",
            TurnStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Everything one actor contributed to a round.
#[derive(Clone, Debug, PartialEq)]
pub struct ActorOutcome {
    pub role: Role,
    pub directive: String,
    pub analysis: AnalystResult,
    pub narration: NarratorOutput,
}

/// Text of the history entry recording an actor's directive.
pub fn decision_text(role: &Role, directive: &str) -> String {
    if role.is_ai() {
        format!("{} decision: {directive}", role.label)
    } else {
        directive.to_string()
    }
}

/// Narration for a degraded analysis, which skips the narrator.
fn failed_narration(analysis: &AnalystResult) -> Option<NarratorOutput> {
    analysis.failure_narrative().map(|narrative| NarratorOutput {
        narrative,
        options: Vec::new(),
        degraded: true,
    })
}

/// Analyst then narrator for one actor. The analyst always completes before
/// the narrator starts; a degraded analysis skips the narrator.
pub async fn resolve_actor(
    backend: &dyn GenerationBackend,
    limits: &StageLimits,
    view: &TurnView<'_>,
    role: &Role,
    directive: &str,
) -> ActorOutcome {
    debug!(game_id = view.game_id, position = %role.position, stage = %TurnStage::Analyze, "resolving actor");
    let analysis = stages::analyze(backend, limits, view, role, directive).await;
    let narration = match failed_narration(&analysis) {
        Some(narration) => {
            debug!(game_id = view.game_id, position = %role.position, stage = %TurnStage::Failed, "skipping narrator");
            narration
        }
        None => {
            debug!(game_id = view.game_id, position = %role.position, stage = %TurnStage::Narrate, "narrating");
            stages::narrate(backend, limits, view, role, directive, &analysis).await
        }
    };
    ActorOutcome {
        role: role.clone(),
        directive: directive.to_string(),
        analysis,
        narration,
    }
}

/// The round under construction. Starts from the previous document and
/// absorbs actor outcomes in priority order.
#[derive(Clone, Debug, PartialEq)]
pub struct RoundState {
    pub attributes: Attributes,
    pub history: HistoryLog,
    /// Most recent non-empty option set, if any actor produced one.
    pub options: Option<Vec<GameOption>>,
    pub summaries: Vec<String>,
}

impl RoundState {
    pub fn from_document(doc: &RoundDocument) -> Self {
        Self {
            attributes: doc.attributes.clone(),
            history: doc.history.clone(),
            options: None,
            summaries: Vec::new(),
        }
    }

    /// View of this state for generation calls. The turn stays the
    /// document's turn for every actor of the round.
    pub fn view<'a>(&'a self, doc: &'a RoundDocument, window: usize) -> TurnView<'a> {
        TurnView {
            game_id: &doc.game_id,
            company_name: doc.company_name.as_deref(),
            turn: doc.turn,
            attributes: &self.attributes,
            formulas: &doc.formulas,
            passive_rules: &doc.passive_rules,
            history: &self.history,
            window,
        }
    }

    /// Apply an analysis to the attributes; returns the changes that stuck
    /// after clamping.
    pub fn apply_analysis(&mut self, schema: &AttributeSchema, analysis: &AnalystResult) -> Deltas {
        let next = apply_deltas(schema, &self.attributes, &analysis.attribute_changes);
        let applied = diff(&self.attributes, &next);
        self.attributes = next;
        let summary = analysis.event_summary.trim();
        if !summary.is_empty() {
            self.summaries.push(summary.to_string());
        }
        applied
    }

    /// Append the decision and narration entries for an actor and keep its
    /// options if it produced any.
    pub fn record(
        &mut self,
        role: &Role,
        directive: &str,
        narrative: &str,
        logic_chain: &str,
        options: Vec<GameOption>,
    ) {
        self.history = self.history.append([
            HistoryEntry::player(&role.player_id, &role.position, decision_text(role, directive)),
            HistoryEntry::system(Some(&role.position), narrative).with_logic_chain(logic_chain),
        ]);
        if !options.is_empty() {
            self.options = Some(options);
        }
    }

    /// Fold a complete outcome: numbers first, then history and options.
    pub fn fold(&mut self, schema: &AttributeSchema, outcome: ActorOutcome) -> Deltas {
        let applied = self.apply_analysis(schema, &outcome.analysis);
        self.record(
            &outcome.role,
            &outcome.directive,
            &outcome.narration.narrative,
            &outcome.analysis.logic_chain,
            outcome.narration.options,
        );
        applied
    }

    pub fn event_summary(&self) -> String {
        self.summaries.join(" ")
    }

    /// The next document. Without fresh options the previous set carries over.
    pub fn into_successor(self, previous: &RoundDocument) -> RoundDocument {
        let options = self
            .options
            .unwrap_or_else(|| previous.current_options.clone());
        previous.successor(self.attributes, self.history, options)
    }
}
