//! Prompt text for every generation stage.

use crate::stages::TurnView;
use gm_core::{AnalystResult, Role};
use serde_json::Value;
use std::fmt::Write;

pub const GAME_MANUAL: &str = "\
[GAME RULES]
Game: \"Every Wall Is a Door\".
1. Players run a company through written directives; the game master resolves \
them and offers strategic options that follow from the company's attributes.
2. Attributes: cash, morale, reputation, innovation. Morale and reputation range \
from 0 to 100; the others never drop below 0.
3. A directive must be a decision (\"cut prices by 10%\"), not a wished-for \
effect (\"repair relations\"). Unconventional decisions are allowed.
4. Each round represents half a year.
5. Every round draws a hexagram from the Book of Changes that sets the direction \
of random events.
6. Earlier decisions must visibly shape later events.";

pub const HOST_INSTRUCTIONS: &str = "\
[HOST INSTRUCTIONS]
1. Read the whole history and explain how earlier decisions led to the current situation.
2. Compute changes with the formulas: next = current + passive income - passive \
expense + decision effect + random event effect. Write the arithmetic out.
3. Do not invent history that did not happen.";

pub const JSON_SYSTEM: &str =
    "You are a game master engine. Output one strict JSON object only. No markdown fences.";

pub const PROSE_SYSTEM: &str =
    "You are the narrator of a business simulation. Write vivid plain prose. No JSON, no lists, no headings.";

pub const DECISION_SYSTEM: &str =
    "You are an executive in a business simulation. Answer with a single concrete decision in one or two sentences.";

fn formulas_text(formulas: &Value) -> String {
    match formulas {
        Value::Null => "standard logic".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn attributes_text(view: &TurnView<'_>) -> String {
    view.attributes
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn state_block(view: &TurnView<'_>, omen: Option<&str>) -> String {
    let mut out = String::from("[CURRENT STATE]\n");
    if let Some(name) = view.company_name {
        let _ = writeln!(out, "- Company: {name}");
    }
    let _ = writeln!(out, "- Turn: {}", view.turn);
    let _ = writeln!(out, "- Attributes: {}", attributes_text(view));
    let _ = writeln!(out, "- Formulas: {}", formulas_text(view.formulas));
    if !view.passive_rules.is_null() {
        let _ = writeln!(out, "- Passive rules: {}", view.passive_rules);
    }
    if let Some(omen) = omen {
        let _ = writeln!(out, "- Hexagram: {omen}");
    }
    let history = view.history.recent_window(view.window);
    let _ = write!(
        out,
        "\n[HISTORY, the only source of facts]\n{}\n",
        if history.is_empty() { "(none yet)" } else { history.as_str() }
    );
    out
}

pub fn analyst_prompt(view: &TurnView<'_>, role: &Role, directive: &str, omen: &str) -> String {
    format!(
        "{GAME_MANUAL}\n\n{HOST_INSTRUCTIONS}\n\n{state}\n\
[DIRECTIVE from {label}]\n\"{directive}\"\n\n\
[TASK]\nJudge the directive and compute its numeric consequences. Do not write a story.\n\
1. Review what earlier decisions set up.\n\
2. Check whether the directive is a real decision.\n\
3. Apply the formulas and write the arithmetic.\n\
4. Fold in the hexagram's random event.\n\n\
[RESPONSE FORMAT]\n\
{{\"valid\": true, \"logicChain\": \"1. ... 2. ...\", \
\"attributeChanges\": {{\"cash\": -100, \"morale\": -5}}, \
\"eventSummary\": \"one sentence\"}}",
        state = state_block(view, Some(omen)),
        label = role.label,
    )
}

fn verdict_block(analysis: &AnalystResult) -> String {
    let changes = analysis
        .attribute_changes
        .iter()
        .map(|(k, v)| format!("{k} {v:+}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "[ANALYST VERDICT, fixed]\n- Valid: {}\n- Logic: {}\n- Changes: {}\n- Summary: {}\n",
        analysis.valid,
        analysis.logic_chain,
        if changes.is_empty() { "none" } else { changes.as_str() },
        analysis.event_summary,
    )
}

pub fn narrator_prompt(
    view: &TurnView<'_>,
    role: &Role,
    directive: &str,
    analysis: &AnalystResult,
    omen: &str,
) -> String {
    format!(
        "{GAME_MANUAL}\n\n{state}\n[DIRECTIVE from {label}]\n\"{directive}\"\n\n{verdict}\n\
[TASK]\nTell what happens this half year in about 300 words, consistent with the verdict. \
Do not change any numbers. Then offer at most 4 follow-up decisions.\n\n\
[RESPONSE FORMAT]\n\
{{\"narrative\": \"...\", \"options\": [{{\"id\": \"1\", \"label\": \"...\", \"description\": \"...\", \
\"cost\": 100, \"costDescription\": \"...\", \"predictedEffect\": \"...\"}}]}}",
        state = state_block(view, Some(omen)),
        label = role.label,
        verdict = verdict_block(analysis),
    )
}

pub fn prose_prompt(
    view: &TurnView<'_>,
    role: &Role,
    directive: &str,
    analysis: &AnalystResult,
    omen: &str,
) -> String {
    format!(
        "{GAME_MANUAL}\n\n{state}\n[DIRECTIVE from {label}]\n\"{directive}\"\n\n{verdict}\n\
[TASK]\nTell what happens this half year in about 300 words, consistent with the verdict. \
Do not change any numbers and do not offer options.",
        state = state_block(view, Some(omen)),
        label = role.label,
        verdict = verdict_block(analysis),
    )
}

pub fn options_prompt(view: &TurnView<'_>, next_actor: &Role, latest_narrative: &str) -> String {
    format!(
        "{GAME_MANUAL}\n\n{state}\n[LATEST DEVELOPMENTS]\n{latest_narrative}\n\n\
[TASK]\nOffer the {label} at most 4 concrete decisions for the next half year.\n\n\
[RESPONSE FORMAT]\n\
{{\"options\": [{{\"id\": \"1\", \"label\": \"...\", \"description\": \"...\", \
\"cost\": 100, \"costDescription\": \"...\", \"predictedEffect\": \"...\"}}]}}",
        state = state_block(view, None),
        label = next_actor.label,
    )
}

pub fn decision_prompt(view: &TurnView<'_>, role: &Role) -> String {
    format!(
        "{state}\n[YOUR ROLE]\nYou are the {label}. You care about: {focus}.\n\n\
[TASK]\nState the one decision you take this half year.",
        state = state_block(view, None),
        label = role.label,
        focus = if role.focus.is_empty() { "the company's success" } else { role.focus.as_str() },
    )
}

pub fn setup_prompt(settings: &str, attribute_keys: &[&str]) -> String {
    format!(
        "{GAME_MANUAL}\n\n[TASK]\nSet up a new game.\n\n[PLAYER SETTINGS]\n{settings}\n\n\
[REQUIREMENTS]\n1. Write an opening story of about 600 words with several competing parties.\n\
2. Define formulas for how each attribute changes every round.\n\
3. Choose initial values for: {keys}.\n\n\
[RESPONSE FORMAT]\n\
{{\"narrative\": \"...\", \
\"formulas\": {{\"cash_rule\": \"Cash_Next = Cash - 50 + Innovation * 5 + Action_Effect\"}}, \
\"passiveRules\": {{\"income_base\": 100, \"expense_base\": 50}}, \
\"initialAttributes\": {{\"cash\": 1000}}, \
\"firstOptions\": [{{\"id\": \"1\", \"label\": \"...\", \"description\": \"...\", \"predictedEffect\": \"...\"}}]}}",
        keys = attribute_keys.join(", "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use gm_core::{Attributes, HistoryEntry, HistoryLog, Roster};
    use serde_json::json;

    #[test]
    fn analyst_prompt_carries_state_and_omen() {
        let mut attributes = Attributes::new();
        attributes.insert("cash".into(), 900);
        let history = HistoryLog::new().append([HistoryEntry::system(None, "Founded.")]);
        let formulas = json!({"cash_rule": "Cash - 50"});
        let view = TurnView {
            game_id: "g",
            company_name: Some("Nexus Corp"),
            turn: 2,
            attributes: &attributes,
            formulas: &formulas,
            passive_rules: &Value::Null,
            history: &history,
            window: 30,
        };
        let roster = Roster::default();
        let ceo = roster.role("ceo").unwrap();
        let text = analyst_prompt(&view, ceo, "cut prices", "Fu, Return (the turning point)");
        assert!(text.contains("cash=900"));
        assert!(text.contains("Cash - 50"));
        assert!(text.contains("[SYSTEM] NARRATOR: Founded."));
        assert!(text.contains("Fu, Return"));
        assert!(text.contains("\"cut prices\""));
        assert!(!text.contains("Passive rules"));

        let decision = decision_prompt(&view, roster.role("cto").unwrap());
        assert!(decision.contains("technology and product"));
    }
}
