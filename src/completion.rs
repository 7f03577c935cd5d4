//! Completion oracle: one prompt in, one block of text out.
//!
//! `CompletionClient` talks to an OpenAI-compatible `chat/completions`
//! endpoint (Gemini's compatibility layer by default). Every failure is folded
//! into `Completion::Fallback`, so callers always get something renderable.
//!
//! Calls log model name, latency, token usage and response size, never the
//! prompt or response text. The API key is never logged.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::config::OracleSettings;
use crate::domain::Completion;

pub const FALLBACK_MESSAGE: &str = "⚠️ AI response unavailable. Please try again later.";

const TEMPERATURE: f32 = 0.7;

#[derive(Debug, Error)]
pub enum CompletionError {
  #[error("request failed: {0}")]
  Transport(#[from] reqwest::Error),
  #[error("HTTP {status}: {message}")]
  Status { status: u16, message: String },
}

/// Anything that can turn a prompt into text without failing.
#[async_trait]
pub trait CompletionOracle: Send + Sync {
  async fn complete(&self, prompt: &str) -> Completion;
}

/// Wrap a raw oracle result into the never-fail contract.
pub fn degrade(result: Result<String, CompletionError>) -> Completion {
  match result {
    Ok(text) => {
      let text = text.trim();
      if text.is_empty() {
        Completion::Fallback(FALLBACK_MESSAGE.to_string())
      } else {
        Completion::Generated(text.to_string())
      }
    }
    Err(e) => Completion::Fallback(format!("⚠️ AI Error: {}\n{}", e, FALLBACK_MESSAGE)),
  }
}

#[derive(Clone)]
pub struct CompletionClient {
  client: reqwest::Client,
  api_key: String,
  pub base_url: String,
  pub model: String,
}

impl CompletionClient {
  pub fn new(settings: &OracleSettings) -> Result<Self, CompletionError> {
    let client = reqwest::Client::builder().timeout(settings.timeout).build()?;
    Ok(Self {
      client,
      api_key: settings.api_key.clone(),
      base_url: settings.base_url.clone(),
      model: settings.model.clone(),
    })
  }

  /// Single chat completion with the prompt as the only user message. No retry.
  #[instrument(level = "info", target = "oracle", skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
  async fn chat_plain(&self, prompt: &str) -> Result<String, CompletionError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![ChatMessageReq { role: "user".into(), content: prompt.into() }],
      temperature: TEMPERATURE,
    };

    let res = self.client.post(&url)
      .header(USER_AGENT, "manager-course/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_api_error(&body).unwrap_or(body);
      return Err(CompletionError::Status { status, message });
    }

    let body: ChatCompletionResponse = res.json().await?;
    if let Some(usage) = &body.usage {
      info!(target: "oracle", prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "Completion usage");
    }
    let text = body.choices.into_iter().next()
      .and_then(|c| c.message.content)
      .unwrap_or_default();
    Ok(text)
  }
}

#[async_trait]
impl CompletionOracle for CompletionClient {
  async fn complete(&self, prompt: &str) -> Completion {
    let start = Instant::now();
    let result = self.chat_plain(prompt).await;
    let elapsed = start.elapsed();
    match &result {
      Ok(text) if text.trim().is_empty() => warn!(target: "oracle", ?elapsed, "Empty completion; using fallback text"),
      Ok(text) => info!(target: "oracle", ?elapsed, response_len = text.len(), "Completion received"),
      Err(e) => error!(target: "oracle", ?elapsed, error = %e, "Completion failed; using fallback text"),
    }
    degrade(result)
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  #[serde(default)] choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Pull `error.message` out of an API error body. Gemini wraps errors in a
/// one-element array, so both shapes are accepted.
fn extract_api_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  if let Ok(w) = serde_json::from_str::<EWrap>(body) {
    return Some(w.error.message);
  }
  serde_json::from_str::<Vec<EWrap>>(body)
    .ok()
    .and_then(|v| v.into_iter().next())
    .map(|w| w.error.message)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  use serde_json::json;
  use wiremock::{
    matchers::{body_partial_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
  };

  fn client_for(server: &MockServer) -> CompletionClient {
    CompletionClient::new(&OracleSettings {
      api_key: "test-key".into(),
      base_url: server.uri(),
      model: "test-model".into(),
      timeout: Duration::from_secs(5),
    })
    .unwrap()
  }

  #[tokio::test]
  async fn returns_generated_text_on_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .and(header("Authorization", "Bearer test-key"))
      .and(body_partial_json(json!({
        "model": "test-model",
        "messages": [{ "role": "user", "content": "Describe a rush hour." }]
      })))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{ "message": { "role": "assistant", "content": "  Lunch rush, two servers short.  " } }],
        "usage": { "prompt_tokens": 5, "completion_tokens": 6, "total_tokens": 11 }
      })))
      .expect(1)
      .mount(&server)
      .await;

    let out = client_for(&server).complete("Describe a rush hour.").await;
    assert_eq!(out, Completion::Generated("Lunch rush, two servers short.".into()));
  }

  #[tokio::test]
  async fn http_error_degrades_to_fallback_with_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .respond_with(ResponseTemplate::new(429).set_body_json(json!([
        { "error": { "code": 429, "message": "Resource has been exhausted" } }
      ])))
      .expect(1)
      .mount(&server)
      .await;

    let out = client_for(&server).complete("anything").await;
    assert!(out.is_fallback());
    assert!(out.text().starts_with("⚠️ AI Error: HTTP 429: Resource has been exhausted"));
    assert!(out.text().ends_with(FALLBACK_MESSAGE));
  }

  #[tokio::test]
  async fn empty_choice_degrades_to_plain_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{ "message": { "content": "   " } }]
      })))
      .mount(&server)
      .await;

    let out = client_for(&server).complete("anything").await;
    assert_eq!(out, Completion::Fallback(FALLBACK_MESSAGE.into()));
  }

  #[tokio::test]
  async fn malformed_body_degrades_to_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
      .mount(&server)
      .await;

    let out = client_for(&server).complete("anything").await;
    assert!(out.is_fallback());
    assert!(out.text().starts_with("⚠️ AI Error:"));
  }

  #[tokio::test]
  async fn unreachable_endpoint_degrades_to_fallback() {
    let client = CompletionClient::new(&OracleSettings {
      api_key: "k".into(),
      base_url: "http://127.0.0.1:9".into(),
      model: "m".into(),
      timeout: Duration::from_secs(2),
    })
    .unwrap();
    let out = client.complete("anything").await;
    assert!(out.is_fallback());
    assert!(out.text().ends_with(FALLBACK_MESSAGE));
  }

  #[test]
  fn extract_api_error_accepts_object_and_array() {
    assert_eq!(extract_api_error(r#"{"error":{"message":"bad key"}}"#).as_deref(), Some("bad key"));
    assert_eq!(extract_api_error(r#"[{"error":{"message":"quota"}}]"#).as_deref(), Some("quota"));
    assert_eq!(extract_api_error("plain"), None);
  }
}
