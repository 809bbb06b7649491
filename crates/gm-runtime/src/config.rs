use gm_ai::{SetupDefaults, StageLimits};
use gm_core::{AttributeSchema, Roster, HISTORY_WINDOW};
use serde::{Deserialize, Serialize};

/// How AI subordinates are resolved outside the streaming path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiDispatch {
    /// All subordinates against the post-human state at once, folded in roster order.
    #[default]
    Concurrent,
    /// One after another, each seeing the previous one's result.
    Sequential,
}

/// Game rules and stage settings shared by every request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub company_name: String,
    pub schema: AttributeSchema,
    pub roster: Roster,
    pub limits: StageLimits,
    /// Trailing history entries visible to generation calls.
    pub history_window: usize,
    pub ai_dispatch: AiDispatch,
    pub setup: SetupDefaults,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            company_name: "Nexus Corp".to_string(),
            schema: AttributeSchema::default(),
            roster: Roster::default(),
            limits: StageLimits::default(),
            history_window: HISTORY_WINDOW,
            ai_dispatch: AiDispatch::default(),
            setup: SetupDefaults::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let cfg = RuntimeConfig::from_yaml_str(
            "company_name: Orbital Foods\nai_dispatch: sequential\nlimits:\n  analyst:\n    max_output_tokens: 300\n    temperature: 0.1\n",
        )
        .unwrap();
        assert_eq!(cfg.company_name, "Orbital Foods");
        assert_eq!(cfg.ai_dispatch, AiDispatch::Sequential);
        assert_eq!(cfg.limits.analyst.max_output_tokens, Some(300));
        assert_eq!(cfg.limits.narrator, StageLimits::default().narrator);
        assert_eq!(cfg.history_window, HISTORY_WINDOW);
        assert_eq!(cfg.roster.subordinates().len(), 2);
    }
}
