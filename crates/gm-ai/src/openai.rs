//! Client for OpenAI-compatible `/chat/completions` endpoints.
//!
//! Structured calls set `response_format: json_object`; streaming calls set
//! `stream: true` and decode the server-sent `data:` lines into prose
//! fragments.

use crate::backend::{CompletionRequest, GenerationBackend, GenerationError, TextStream};
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Where and how to reach the generation backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL including the API version prefix, e.g. "https://api.openai.com/v1".
    pub base_url: String,
    pub model: String,
    /// Client-side request timeout. `None` waits indefinitely.
    pub timeout_secs: Option<u64>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: None,
        }
    }
}

impl BackendConfig {
    pub fn build_client(&self) -> Result<reqwest::Client, GenerationError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = self.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(builder.build()?)
    }
}

/// Backend bound to one caller's API key.
#[derive(Clone)]
pub struct OpenAiBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiBackend {
    pub fn new(client: reqwest::Client, config: &BackendConfig, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: api_key.into(),
        }
    }

    fn body<'a>(&'a self, request: &CompletionRequest, stream: bool) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: request.system_prompt.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.user_prompt.clone(),
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_output_tokens,
            response_format: request.structured.then_some(ResponseFormat { kind: "json_object" }),
            stream,
        }
    }

    async fn send(&self, request: &CompletionRequest, stream: bool) -> Result<reqwest::Response, GenerationError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(purpose = ?request.purpose, actor = ?request.actor, stream, "calling generation backend");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.body(request, stream))
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status { status, body });
        }
        Ok(response)
    }
}

#[async_trait]
impl GenerationBackend for OpenAiBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        let response: ChatResponse = self.send(request, false).await?.json().await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(GenerationError::Empty)
    }

    async fn complete_stream(&self, request: &CompletionRequest) -> Result<TextStream, GenerationError> {
        let response = self.send(request, true).await?;
        // A trailing `None` flushes a last line that arrived without a newline.
        let stream = response
            .bytes_stream()
            .map(Some)
            .chain(futures::stream::once(futures::future::ready(None)))
            .scan(SseDecoder::default(), |decoder, chunk| {
                let items: Vec<Result<String, GenerationError>> = match chunk {
                    Some(Ok(bytes)) => decoder.push(&bytes).into_iter().map(Ok).collect(),
                    Some(Err(e)) => vec![Err(GenerationError::from(e))],
                    None => decoder.finish().into_iter().map(Ok).collect(),
                };
                futures::future::ready(Some(futures::stream::iter(items)))
            })
            .flatten()
            .boxed();
        Ok(stream)
    }
}

/// Incremental decoder for `data:` lines of a chat-completions event stream.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    /// Feed raw bytes; returns the prose fragments completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut out = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.decode_line(&line, &mut out);
        }
        out
    }

    /// Decode whatever is left once the byte stream has ended.
    pub fn finish(&mut self) -> Vec<String> {
        let rest = std::mem::take(&mut self.buffer);
        let mut out = Vec::new();
        self.decode_line(&rest, &mut out);
        out
    }

    fn decode_line(&mut self, line: &[u8], out: &mut Vec<String>) {
        if self.done {
            return;
        }
        let line = String::from_utf8_lossy(line);
        let Some(data) = line.trim().strip_prefix("data:") else {
            return;
        };
        let data = data.trim();
        if data == "[DONE]" {
            self.done = true;
            return;
        }
        match serde_json::from_str::<StreamChunk>(data) {
            Ok(chunk) => out.extend(
                chunk
                    .choices
                    .into_iter()
                    .filter_map(|c| c.delta.content)
                    .filter(|s| !s.is_empty()),
            ),
            Err(e) => debug!(error = %e, "skipping undecodable stream line"),
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Purpose;

    #[test]
    fn test_client_creation() {
        let config = BackendConfig {
            base_url: "http://localhost:8000/v1/".to_string(),
            ..BackendConfig::default()
        };
        let backend = OpenAiBackend::new(config.build_client().unwrap(), &config, "sk-test");
        assert_eq!(backend.base_url, "http://localhost:8000/v1");
    }

    #[test]
    fn structured_requests_ask_for_json_objects() {
        let config = BackendConfig::default();
        let backend = OpenAiBackend::new(reqwest::Client::new(), &config, "k");
        let req = CompletionRequest::new(Purpose::Analyze, "sys", "user")
            .structured()
            .max_output_tokens(Some(600));
        let body = serde_json::to_value(backend.body(&req, false)).unwrap();
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["max_tokens"], 600);
        assert!(body.get("stream").is_none());
        assert_eq!(body["messages"][0]["role"], "system");

        let prose = CompletionRequest::new(Purpose::Narrate, "sys", "user");
        let body = serde_json::to_value(backend.body(&prose, true)).unwrap();
        assert!(body.get("response_format").is_none());
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn decoder_handles_split_lines_and_done() {
        let mut d = SseDecoder::default();
        let first = d.push(b"data: {\"choices\":[{\"delta\":{\"content\":\"The \"}}]}\n\ndata: {\"choi");
        assert_eq!(first, vec!["The ".to_string()]);
        let second = d.push(b"ces\":[{\"delta\":{\"content\":\"board\"}}]}\n\n: keep-alive\n");
        assert_eq!(second, vec!["board".to_string()]);
        let third = d.push(b"data: [DONE]\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n");
        assert!(third.is_empty());
        assert!(d.is_done());
    }

    #[test]
    fn decoder_flushes_an_unterminated_last_line() {
        let mut d = SseDecoder::default();
        assert!(d.push(b"data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}").is_empty());
        assert_eq!(d.finish(), vec!["tail".to_string()]);
        assert!(d.finish().is_empty());

        let mut done = SseDecoder::default();
        assert!(done.push(b"data: [DONE]").is_empty());
        assert!(done.finish().is_empty());
        assert!(done.is_done());
    }

    #[test]
    fn decoder_keeps_multibyte_text_intact_across_chunks() {
        let mut d = SseDecoder::default();
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"营收\"}}]}\n".as_bytes();
        let (a, b) = line.split_at(line.len() - 8);
        assert!(d.push(a).is_empty());
        assert_eq!(d.push(b), vec!["营收".to_string()]);
    }
}
