//! Results of the two resolution stages.

use crate::attributes::Deltas;
use crate::document::GameOption;
use serde::{Deserialize, Serialize};

/// Prefix marking narration that reports a failed generation call.
pub const DEGRADED_PREFIX: &str = "[generation failed] ";

/// Output of the analyst stage: the only source of numeric truth for a turn.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalystResult {
    pub valid: bool,
    #[serde(default)]
    pub logic_chain: String,
    #[serde(default)]
    pub attribute_changes: Deltas,
    #[serde(default)]
    pub event_summary: String,
    /// Set when the stage failed and this is a stand-in result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalystResult {
    /// Zero-effect stand-in for a failed analyst call.
    pub fn degraded(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }

    /// Narration that reports why this result is degraded, if it is.
    pub fn failure_narrative(&self) -> Option<String> {
        self.error
            .as_ref()
            .map(|e| format!("{DEGRADED_PREFIX}analysis unavailable: {e}"))
    }
}

/// Output of the narrator stage. Never carries numeric changes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NarratorOutput {
    pub narrative: String,
    #[serde(default)]
    pub options: Vec<GameOption>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,
}

impl NarratorOutput {
    pub fn degraded(reason: &str) -> Self {
        Self {
            narrative: format!("{DEGRADED_PREFIX}{reason}"),
            options: Vec::new(),
            degraded: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degraded_results_have_no_effect() {
        let a = AnalystResult::degraded("backend returned 502");
        assert!(a.is_degraded());
        assert!(!a.valid);
        assert!(a.attribute_changes.is_empty());
        let text = a.failure_narrative().unwrap();
        assert!(text.starts_with(DEGRADED_PREFIX));
        assert!(text.contains("502"));
        assert!(AnalystResult::default().failure_narrative().is_none());
    }

    #[test]
    fn degraded_narration_is_marked() {
        let n = NarratorOutput::degraded("timeout");
        assert!(n.degraded);
        assert!(n.options.is_empty());
        assert_eq!(n.narrative, format!("{DEGRADED_PREFIX}timeout"));
    }
}
