//! The generation stages of a turn: setup, analyst, narrator, options and
//! AI decisions.
//!
//! Every stage converts backend failures into degraded values at this
//! boundary, so callers never see a [`GenerationError`] except from
//! [`stream_prose`], whose caller owns the partial text.

use crate::backend::{CompletionRequest, GenerationBackend, GenerationError, Purpose, TextStream};
use crate::omen;
use crate::parse::{
    analyst_from_value, attributes_from_value, extract_json_object, narrative_from_value,
    options_from_value, present,
};
use crate::prompts;
use gm_core::directive;
use gm_core::{
    AnalystResult, AttributeSchema, Attributes, GameOption, HistoryLog, NarratorOutput, Role,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

/// Read-only view of the state an actor resolves against.
#[derive(Clone, Copy, Debug)]
pub struct TurnView<'a> {
    pub game_id: &'a str,
    pub company_name: Option<&'a str>,
    pub turn: u64,
    pub attributes: &'a Attributes,
    pub formulas: &'a Value,
    pub passive_rules: &'a Value,
    pub history: &'a HistoryLog,
    /// Trailing history entries to include in prompts.
    pub window: usize,
}

impl TurnView<'_> {
    pub fn omen(&self) -> &'static str {
        omen::draw(self.game_id, self.turn)
    }
}

/// Output budget and sampling temperature for one stage.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StageLimit {
    pub max_output_tokens: Option<u32>,
    pub temperature: f32,
}

impl StageLimit {
    pub const fn new(max_output_tokens: u32, temperature: f32) -> Self {
        Self {
            max_output_tokens: Some(max_output_tokens),
            temperature,
        }
    }

    fn apply(&self, request: CompletionRequest) -> CompletionRequest {
        request
            .max_output_tokens(self.max_output_tokens)
            .temperature(self.temperature)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageLimits {
    pub setup: StageLimit,
    pub analyst: StageLimit,
    pub narrator: StageLimit,
    pub options: StageLimit,
    pub decision: StageLimit,
}

impl Default for StageLimits {
    fn default() -> Self {
        Self {
            setup: StageLimit::new(2400, 0.8),
            analyst: StageLimit::new(800, 0.3),
            narrator: StageLimit::new(1200, 0.8),
            options: StageLimit::new(600, 0.7),
            decision: StageLimit::new(160, 0.9),
        }
    }
}

/// Analyst stage. Failures yield [`AnalystResult::degraded`].
pub async fn analyze(
    backend: &dyn GenerationBackend,
    limits: &StageLimits,
    view: &TurnView<'_>,
    role: &Role,
    directive: &str,
) -> AnalystResult {
    let request = limits.analyst.apply(
        CompletionRequest::new(
            Purpose::Analyze,
            prompts::JSON_SYSTEM,
            prompts::analyst_prompt(view, role, directive, view.omen()),
        )
        .structured()
        .for_actor(&role.position),
    );
    let outcome = match backend.complete(&request).await {
        Ok(raw) => extract_json_object(&raw).map(|map| analyst_from_value(&map)),
        Err(e) => Err(e),
    };
    match outcome {
        Ok(result) => {
            debug!(
                game_id = view.game_id,
                position = %role.position,
                valid = result.valid,
                changes = result.attribute_changes.len(),
                "analysis complete"
            );
            result
        }
        Err(e) => {
            warn!(game_id = view.game_id, position = %role.position, stage = "analyze", error = %e, "analysis degraded");
            AnalystResult::degraded(e.to_string())
        }
    }
}

/// Narrator stage in one structured call: prose plus options.
pub async fn narrate(
    backend: &dyn GenerationBackend,
    limits: &StageLimits,
    view: &TurnView<'_>,
    role: &Role,
    directive: &str,
    analysis: &AnalystResult,
) -> NarratorOutput {
    let request = limits.narrator.apply(
        CompletionRequest::new(
            Purpose::Narrate,
            prompts::JSON_SYSTEM,
            prompts::narrator_prompt(view, role, directive, analysis, view.omen()),
        )
        .structured()
        .for_actor(&role.position),
    );
    let outcome = backend.complete(&request).await.and_then(|raw| {
        let map = extract_json_object(&raw)?;
        let narrative = narrative_from_value(&map);
        if narrative.trim().is_empty() {
            return Err(GenerationError::MalformedJson("missing narrative".into()));
        }
        Ok(NarratorOutput {
            narrative,
            options: options_from_value(&map),
            degraded: false,
        })
    });
    outcome.unwrap_or_else(|e| {
        warn!(game_id = view.game_id, position = %role.position, stage = "narrate", error = %e, "narration degraded");
        NarratorOutput::degraded(&e.to_string())
    })
}

/// Narrator prose as a token stream. Options come from [`next_options`].
pub async fn stream_prose(
    backend: &dyn GenerationBackend,
    limits: &StageLimits,
    view: &TurnView<'_>,
    role: &Role,
    directive: &str,
    analysis: &AnalystResult,
) -> Result<TextStream, GenerationError> {
    let request = limits.narrator.apply(
        CompletionRequest::new(
            Purpose::Narrate,
            prompts::PROSE_SYSTEM,
            prompts::prose_prompt(view, role, directive, analysis, view.omen()),
        )
        .for_actor(&role.position),
    );
    backend.complete_stream(&request).await
}

/// Options for `next_actor` after the latest narration. Empty on failure.
pub async fn next_options(
    backend: &dyn GenerationBackend,
    limits: &StageLimits,
    view: &TurnView<'_>,
    next_actor: &Role,
    latest_narrative: &str,
) -> Vec<GameOption> {
    let request = limits.options.apply(
        CompletionRequest::new(
            Purpose::Options,
            prompts::JSON_SYSTEM,
            prompts::options_prompt(view, next_actor, latest_narrative),
        )
        .structured(),
    );
    match backend
        .complete(&request)
        .await
        .and_then(|raw| extract_json_object(&raw))
    {
        Ok(map) => options_from_value(&map),
        Err(e) => {
            warn!(game_id = view.game_id, stage = "options", error = %e, "option generation failed");
            Vec::new()
        }
    }
}

/// Free-text decision of an AI role. Empty or failed output becomes the
/// no-op directive.
pub async fn decide(
    backend: &dyn GenerationBackend,
    limits: &StageLimits,
    view: &TurnView<'_>,
    role: &Role,
) -> String {
    let request = limits.decision.apply(
        CompletionRequest::new(
            Purpose::Decide,
            prompts::DECISION_SYSTEM,
            prompts::decision_prompt(view, role),
        )
        .for_actor(&role.position),
    );
    match backend.complete(&request).await {
        Ok(text) => directive::normalize(&text),
        Err(e) => {
            warn!(game_id = view.game_id, position = %role.position, stage = "decide", error = %e, "decision failed");
            directive::normalize("")
        }
    }
}

/// Values a new game starts from when generation leaves a field out.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SetupDefaults {
    pub narrative: String,
    pub formulas: Value,
    pub passive_rules: Value,
    pub options: Vec<GameOption>,
}

impl Default for SetupDefaults {
    fn default() -> Self {
        Self {
            narrative: "Welcome to Every Wall Is a Door. You have just been appointed chief \
                        executive of Nexus Corp."
                .to_string(),
            formulas: json!({
                "cash_rule": "Cash_Next = Cash - 50 (Base Cost) + Innovation * 5 (Licensing) + Action_Effect",
                "morale_rule": "Morale_Next = Morale - 2 (Fatigue) + Action_Effect"
            }),
            passive_rules: json!({"income_base": 100, "expense_base": 50}),
            options: vec![
                GameOption::new(
                    "1",
                    "Increase R&D investment",
                    "Put more resources into research to raise innovation",
                    "innovation +10, cash -200",
                ),
                GameOption::new(
                    "2",
                    "Launch a marketing campaign",
                    "Raise the marketing budget to build brand awareness",
                    "reputation +10, cash -150",
                ),
                GameOption::new(
                    "3",
                    "Streamline internal processes",
                    "Improve internal management to raise efficiency",
                    "morale +5, cash -100",
                ),
            ],
        }
    }
}

/// Opening state of a new game.
#[derive(Clone, Debug, PartialEq)]
pub struct InitialSetup {
    pub narrative: String,
    pub formulas: Value,
    pub passive_rules: Value,
    /// Restricted to schema keys and clamped.
    pub attributes: Attributes,
    pub options: Vec<GameOption>,
    /// True when the setup call failed outright and only defaults were used.
    pub degraded: bool,
}

/// Setup stage. Each missing field falls back to `defaults` independently.
pub async fn setup(
    backend: &dyn GenerationBackend,
    limits: &StageLimits,
    settings: &str,
    schema: &AttributeSchema,
    defaults: &SetupDefaults,
) -> InitialSetup {
    let keys: Vec<&str> = schema.resources.iter().map(|r| r.key.as_str()).collect();
    let request = limits.setup.apply(
        CompletionRequest::new(
            Purpose::Setup,
            prompts::JSON_SYSTEM,
            prompts::setup_prompt(settings, &keys),
        )
        .structured(),
    );
    let map = match backend
        .complete(&request)
        .await
        .and_then(|raw| extract_json_object(&raw))
    {
        Ok(map) => map,
        Err(e) => {
            warn!(stage = "setup", error = %e, "setup generation failed; using defaults");
            return InitialSetup {
                narrative: defaults.narrative.clone(),
                formulas: defaults.formulas.clone(),
                passive_rules: defaults.passive_rules.clone(),
                attributes: schema.initial_snapshot(),
                options: defaults.options.clone(),
                degraded: true,
            };
        }
    };

    let narrative = Some(narrative_from_value(&map))
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| defaults.narrative.clone());
    let generated = present(&map, &["initialAttributes", "initial_attributes", "attributes"])
        .map(|v| attributes_from_value(&v))
        .unwrap_or_default();
    let options = options_from_value(&map);
    InitialSetup {
        narrative,
        formulas: present(&map, &["formulas"]).unwrap_or_else(|| defaults.formulas.clone()),
        passive_rules: present(&map, &["passiveRules", "passive_rules"])
            .unwrap_or_else(|| defaults.passive_rules.clone()),
        attributes: schema.seed(&generated),
        options: if options.is_empty() {
            defaults.options.clone()
        } else {
            options
        },
        degraded: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::{Reply, ScriptedBackend};
    use gm_core::{Roster, DEGRADED_PREFIX};

    struct Fixture {
        attributes: Attributes,
        history: HistoryLog,
        formulas: Value,
        passive_rules: Value,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                attributes: AttributeSchema::default().initial_snapshot(),
                history: HistoryLog::new(),
                formulas: Value::Null,
                passive_rules: Value::Null,
            }
        }

        fn view(&self) -> TurnView<'_> {
            TurnView {
                game_id: "g",
                company_name: None,
                turn: 1,
                attributes: &self.attributes,
                formulas: &self.formulas,
                passive_rules: &self.passive_rules,
                history: &self.history,
                window: 30,
            }
        }
    }

    fn ceo() -> Role {
        Roster::default().resolve("ceo", "player_human")
    }

    #[tokio::test]
    async fn analysis_parses_scripted_reply() {
        let backend = ScriptedBackend::new().on(
            Purpose::Analyze,
            Reply::text(r#"{"valid": true, "logic_chain": "spend", "attribute_changes": {"cash": -100}}"#),
        );
        let fx = Fixture::new();
        let result = analyze(&backend, &StageLimits::default(), &fx.view(), &ceo(), "A").await;
        assert!(result.valid);
        assert_eq!(result.attribute_changes.get("cash"), Some(&-100));
        let call = &backend.calls()[0];
        assert!(call.structured);
        assert_eq!(call.actor.as_deref(), Some("ceo"));
        assert_eq!(call.max_output_tokens, Some(800));
    }

    #[tokio::test]
    async fn malformed_analysis_degrades() {
        let backend = ScriptedBackend::new().on(Purpose::Analyze, Reply::text("not json at all"));
        let fx = Fixture::new();
        let result = analyze(&backend, &StageLimits::default(), &fx.view(), &ceo(), "A").await;
        assert!(result.is_degraded());
        assert!(result.attribute_changes.is_empty());

        let failing = ScriptedBackend::new().on(Purpose::Analyze, Reply::fail("502 bad gateway"));
        let result = analyze(&failing, &StageLimits::default(), &fx.view(), &ceo(), "A").await;
        assert!(result.error.unwrap().contains("502"));
    }

    #[tokio::test]
    async fn narrator_cannot_change_numbers() {
        let backend = ScriptedBackend::new().on(
            Purpose::Narrate,
            Reply::text(
                r#"{"narrative": "Servers hum.", "attribute_changes": {"cash": 9999},
                    "options": [{"label": "Hire"}]}"#,
            ),
        );
        let fx = Fixture::new();
        let analysis = AnalystResult::default();
        let out = narrate(&backend, &StageLimits::default(), &fx.view(), &ceo(), "A", &analysis).await;
        assert_eq!(out.narrative, "Servers hum.");
        assert_eq!(out.options.len(), 1);
        assert!(!out.degraded);

        let empty = ScriptedBackend::new().on(Purpose::Narrate, Reply::text(r#"{"options": []}"#));
        let out = narrate(&empty, &StageLimits::default(), &fx.view(), &ceo(), "A", &analysis).await;
        assert!(out.degraded);
        assert!(out.narrative.starts_with(DEGRADED_PREFIX));
    }

    #[tokio::test]
    async fn failed_decision_is_no_op() {
        let backend = ScriptedBackend::new().on(Purpose::Decide, Reply::fail("timeout"));
        let fx = Fixture::new();
        let cto = Roster::default().role("cto").cloned().unwrap();
        let text = decide(&backend, &StageLimits::default(), &fx.view(), &cto).await;
        assert_eq!(text, directive::NO_OP_DIRECTIVE);
    }

    #[tokio::test]
    async fn setup_falls_back_per_field() {
        let backend = ScriptedBackend::new().on(
            Purpose::Setup,
            Reply::text(
                r#"{"narrative": "A new dawn.", "initial_attributes": {"cash": 5000, "morale": 140, "luck": 7},
                    "formulas": {}}"#,
            ),
        );
        let schema = AttributeSchema::default();
        let defaults = SetupDefaults::default();
        let s = setup(&backend, &StageLimits::default(), "a chip startup", &schema, &defaults).await;
        assert_eq!(s.narrative, "A new dawn.");
        assert_eq!(s.attributes.get("cash"), Some(&5000));
        assert_eq!(s.attributes.get("morale"), Some(&100));
        assert_eq!(s.attributes.get("innovation"), Some(&10));
        assert!(!s.attributes.contains_key("luck"));
        assert_eq!(s.formulas, defaults.formulas);
        assert_eq!(s.options, defaults.options);
        assert!(!s.degraded);

        let failing = ScriptedBackend::new().on(Purpose::Setup, Reply::fail("401"));
        let s = setup(&failing, &StageLimits::default(), "", &schema, &defaults).await;
        assert!(s.degraded);
        assert_eq!(s.attributes, schema.initial_snapshot());
        assert_eq!(s.options.len(), 3);
    }

    #[tokio::test]
    async fn setup_keeps_generated_first_options() {
        let backend = ScriptedBackend::new().on(
            Purpose::Setup,
            Reply::text(
                r#"{"narrative": "Dawn.", "initialAttributes": {"Cash": 800},
                    "firstOptions": [{"id": "1", "label": "Build a fab", "predictedEffect": "cash -400"}]}"#,
            ),
        );
        let schema = AttributeSchema::default();
        let s = setup(&backend, &StageLimits::default(), "", &schema, &SetupDefaults::default()).await;
        assert_eq!(s.options.len(), 1);
        assert_eq!(s.options[0].label, "Build a fab");
        assert_eq!(s.attributes.get("cash"), Some(&800));
        assert!(backend.calls()[0].user_prompt.contains("\"firstOptions\""));
    }
}
