//! Deterministic backend that answers from a script. Used by tests and by
//! offline play.

use crate::backend::{CompletionRequest, GenerationBackend, GenerationError, Purpose, TextStream};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Clone, Debug)]
pub enum Reply {
    Text(String),
    Fail(String),
    /// Streams `text`, then fails with `error`. Whole calls just fail.
    Partial { text: String, error: String },
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Reply::Text(text.into())
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Reply::Fail(error.into())
    }

    pub fn partial(text: impl Into<String>, error: impl Into<String>) -> Self {
        Reply::Partial {
            text: text.into(),
            error: error.into(),
        }
    }
}

const CANNED_SETUP: &str = r#"{
  "narrative": "Nexus Corp opens its doors in a crowded market. Rivals watch closely.",
  "initialAttributes": {"cash": 1000, "morale": 50, "reputation": 50, "innovation": 10},
  "firstOptions": [
    {"id": "1", "label": "Increase R&D investment", "description": "Fund the lab", "predictedEffect": "innovation +10, cash -200"},
    {"id": "2", "label": "Launch a marketing campaign", "description": "Buy attention", "predictedEffect": "reputation +10, cash -150"}
  ]
}"#;

const CANNED_ANALYSIS: &str = r#"{
  "valid": true,
  "logicChain": "1. Base cost 50. 2. The team rallies behind the plan.",
  "attributeChanges": {"cash": -50, "morale": 1},
  "eventSummary": "The plan is carried out without surprises."
}"#;

const CANNED_NARRATION: &str = "The half year passes steadily. The plan moves ahead and the \
                                staff watch the numbers closely.";

const CANNED_OPTIONS: &str = r#"{
  "options": [
    {"id": "1", "label": "Hold course", "description": "Keep current plans", "predictedEffect": "no change"},
    {"id": "2", "label": "Cut costs", "description": "Trim the budget", "predictedEffect": "cash +50, morale -5"}
  ]
}"#;

const CANNED_DECISION: &str = "Hold course and review the budget.";

fn canned(request: &CompletionRequest) -> String {
    match request.purpose {
        Purpose::Setup => CANNED_SETUP.to_string(),
        Purpose::Analyze => CANNED_ANALYSIS.to_string(),
        Purpose::Narrate if request.structured => serde_json::json!({
            "narrative": CANNED_NARRATION,
            "options": serde_json::from_str::<serde_json::Value>(CANNED_OPTIONS)
                .ok()
                .and_then(|v| v.get("options").cloned())
                .unwrap_or_default(),
        })
        .to_string(),
        Purpose::Narrate => CANNED_NARRATION.to_string(),
        Purpose::Options => CANNED_OPTIONS.to_string(),
        Purpose::Decide => CANNED_DECISION.to_string(),
    }
}

/// Replies are looked up by (purpose, actor), then by purpose, then fall back
/// to a canned reply for the purpose. Every request is recorded.
#[derive(Default)]
pub struct ScriptedBackend {
    by_purpose: HashMap<Purpose, Reply>,
    by_actor: HashMap<(Purpose, String), Reply>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, purpose: Purpose, reply: Reply) -> Self {
        self.by_purpose.insert(purpose, reply);
        self
    }

    pub fn on_actor(mut self, purpose: Purpose, position: &str, reply: Reply) -> Self {
        self.by_actor.insert((purpose, position.to_string()), reply);
        self
    }

    /// Delay every call made for `position`.
    pub fn with_delay(mut self, position: &str, delay: Duration) -> Self {
        self.delays.insert(position.to_string(), delay);
        self
    }

    /// Requests received so far, in arrival order.
    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn count(&self, purpose: Purpose) -> usize {
        self.calls().iter().filter(|c| c.purpose == purpose).count()
    }

    async fn answer(&self, request: &CompletionRequest) -> Reply {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request.clone());
        }
        if let Some(delay) = request.actor.as_ref().and_then(|a| self.delays.get(a)) {
            tokio::time::sleep(*delay).await;
        }
        request
            .actor
            .as_ref()
            .and_then(|a| self.by_actor.get(&(request.purpose, a.clone())))
            .or_else(|| self.by_purpose.get(&request.purpose))
            .cloned()
            .unwrap_or_else(|| Reply::Text(canned(request)))
    }
}

fn word_chunks(text: &str) -> Vec<Result<String, GenerationError>> {
    text.split_inclusive(' ').map(|w| Ok(w.to_string())).collect()
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        match self.answer(request).await {
            Reply::Text(text) if text.trim().is_empty() => Err(GenerationError::Empty),
            Reply::Text(text) => Ok(text),
            Reply::Fail(error) | Reply::Partial { error, .. } => Err(GenerationError::Backend(error)),
        }
    }

    async fn complete_stream(&self, request: &CompletionRequest) -> Result<TextStream, GenerationError> {
        let chunks = match self.answer(request).await {
            Reply::Text(text) => word_chunks(&text),
            Reply::Fail(error) => return Err(GenerationError::Backend(error)),
            Reply::Partial { text, error } => {
                let mut chunks = word_chunks(&text);
                chunks.push(Err(GenerationError::Backend(error)));
                chunks
            }
        };
        Ok(futures::stream::iter(chunks).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn actor_scripts_take_precedence() {
        let backend = ScriptedBackend::new()
            .on(Purpose::Decide, Reply::text("general"))
            .on_actor(Purpose::Decide, "cmo", Reply::text("cut prices"));
        let cmo = CompletionRequest::new(Purpose::Decide, "s", "u").for_actor("cmo");
        let cto = CompletionRequest::new(Purpose::Decide, "s", "u").for_actor("cto");
        assert_eq!(backend.complete(&cmo).await.unwrap(), "cut prices");
        assert_eq!(backend.complete(&cto).await.unwrap(), "general");
        assert_eq!(backend.count(Purpose::Decide), 2);
    }

    #[tokio::test]
    async fn canned_replies_cover_every_purpose() {
        let backend = ScriptedBackend::new();
        for purpose in [Purpose::Setup, Purpose::Analyze, Purpose::Options] {
            let raw = backend
                .complete(&CompletionRequest::new(purpose, "s", "u").structured())
                .await
                .unwrap();
            assert!(serde_json::from_str::<serde_json::Value>(&raw).unwrap().is_object());
        }
        let narration = backend
            .complete(&CompletionRequest::new(Purpose::Narrate, "s", "u").structured())
            .await
            .unwrap();
        assert!(narration.contains("\"options\""));
    }

    #[tokio::test]
    async fn partial_streams_end_in_an_error() {
        let backend = ScriptedBackend::new().on(Purpose::Narrate, Reply::partial("one two", "reset"));
        let req = CompletionRequest::new(Purpose::Narrate, "s", "u");
        let items: Vec<_> = backend.complete_stream(&req).await.unwrap().collect().await;
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_deref().ok(), Some("one "));
        assert!(items[2].is_err());
        assert!(backend.complete(&req).await.is_err());
    }
}
