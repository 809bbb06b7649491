//! The generation capability the resolution stages are written against.

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

/// Incremental prose fragments from a streaming call.
pub type TextStream = BoxStream<'static, Result<String, GenerationError>>;

/// What a call is for. Backends may ignore it; the scripted backend routes on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Purpose {
    Setup,
    Analyze,
    Narrate,
    Options,
    Decide,
}

#[derive(Clone, Debug)]
pub struct CompletionRequest {
    pub purpose: Purpose,
    /// Position of the actor the call is made for, if any.
    pub actor: Option<String>,
    pub system_prompt: String,
    pub user_prompt: String,
    /// Ask for a single JSON object.
    pub structured: bool,
    pub max_output_tokens: Option<u32>,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(purpose: Purpose, system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            purpose,
            actor: None,
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            structured: false,
            max_output_tokens: None,
            temperature: 0.7,
        }
    }

    pub fn structured(mut self) -> Self {
        self.structured = true;
        self
    }

    pub fn for_actor(mut self, position: &str) -> Self {
        self.actor = Some(position.to_string());
        self
    }

    pub fn max_output_tokens(mut self, limit: Option<u32>) -> Self {
        self.max_output_tokens = limit;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.temperature = t;
        self
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("generation backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("generation backend returned no content")]
    Empty,
    #[error("malformed structured output: {0}")]
    MalformedJson(String),
    #[error("generation backend error: {0}")]
    Backend(String),
}

/// Text completion, either whole or streamed.
///
/// No retries happen at this layer; callers turn failures into degraded
/// results.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError>;

    async fn complete_stream(&self, request: &CompletionRequest) -> Result<TextStream, GenerationError>;
}
