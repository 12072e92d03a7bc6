//! Google Gemini `generateContent` backend.
//!
//! Structured output is requested with `responseMimeType: application/json`
//! and a `responseSchema` in Gemini's schema dialect.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::config::LlmSettings;
use crate::error::UpstreamError;
use crate::schema::SchemaDialect;
use crate::upstream::{extract_provider_error, CompletionBackend, CompletionRequest};
use crate::util::trunc_for_log;

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Clone)]
pub struct Gemini {
  client: reqwest::Client,
  api_key: String,
  pub base_url: String,
  pub model: String,
}

impl Gemini {
  pub fn new(client: reqwest::Client, settings: &LlmSettings) -> Self {
    Self {
      client,
      api_key: settings.api_key.clone(),
      base_url: settings.base_url.clone(),
      model: settings.model.clone(),
    }
  }
}

#[async_trait]
impl CompletionBackend for Gemini {
  fn name(&self) -> &'static str { "gemini" }

  fn model(&self) -> &str { &self.model }

  fn dialect(&self) -> SchemaDialect { SchemaDialect::Gemini }

  #[instrument(level = "info", skip(self, req), fields(model = %self.model, structured = req.structured.is_some(), prompt_len = req.prompt.len()))]
  async fn complete(&self, req: CompletionRequest) -> Result<String, UpstreamError> {
    let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
    let (response_mime_type, response_schema) = match req.structured {
      Some(s) => (Some("application/json".to_string()), Some(s.schema)),
      None => (None, None),
    };
    let body = GenerateContentRequest {
      system_instruction: Content { role: None, parts: vec![Part { text: req.system }] },
      contents: vec![Content { role: Some("user".into()), parts: vec![Part { text: req.prompt }] }],
      generation_config: GenerationConfig {
        temperature: req.temperature,
        response_mime_type,
        response_schema,
      },
    };

    let start = Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "expertise-workbook/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(API_KEY_HEADER, &self.api_key)
      .json(&body).send().await?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let message = extract_provider_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
      return Err(UpstreamError::Status { status: status.as_u16(), message });
    }

    let body: GenerateContentResponse = res.json().await?;
    if let Some(usage) = &body.usage_metadata {
      info!(prompt_tokens = ?usage.prompt_token_count, completion_tokens = ?usage.candidates_token_count, total_tokens = ?usage.total_token_count, "Gemini usage");
    }
    if let Some(feedback) = &body.prompt_feedback {
      if let Some(reason) = &feedback.block_reason {
        warn!(block_reason = %reason, "Gemini blocked the prompt");
      }
    }

    let candidate = body.candidates.into_iter().next().ok_or(UpstreamError::EmptyContent)?;
    if let Some(reason) = candidate.finish_reason.as_deref().filter(|r| *r != "STOP") {
      warn!(finish_reason = %reason, "Gemini candidate did not finish normally");
    }
    let text: String = candidate
      .content
      .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
      .unwrap_or_default();
    info!(elapsed = ?start.elapsed(), response_len = text.len(), "Gemini response received");
    Ok(text)
  }
}

// --- generateContent DTOs ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
  system_instruction: Content,
  contents: Vec<Content>,
  generation_config: GenerationConfig,
}
#[derive(Serialize)]
struct Content {
  #[serde(skip_serializing_if = "Option::is_none")]
  role: Option<String>,
  parts: Vec<Part>,
}
#[derive(Serialize)]
struct Part { text: String }
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_mime_type: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_schema: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
  #[serde(default)] candidates: Vec<Candidate>,
  #[serde(default)] usage_metadata: Option<UsageMetadata>,
  #[serde(default)] prompt_feedback: Option<PromptFeedback>,
}
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
  #[serde(default)] content: Option<CandidateContent>,
  #[serde(default)] finish_reason: Option<String>,
}
#[derive(Deserialize)]
struct CandidateContent {
  #[serde(default)] parts: Vec<CandidatePart>,
}
#[derive(Deserialize)]
struct CandidatePart {
  #[serde(default)] text: Option<String>,
}
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
  #[serde(default)] prompt_token_count: Option<u32>,
  #[serde(default)] candidates_token_count: Option<u32>,
  #[serde(default)] total_token_count: Option<u32>,
}
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
  #[serde(default)] block_reason: Option<String>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::Provider;
  use crate::upstream::StructuredOutput;
  use httpmock::prelude::*;
  use serde_json::json;
  use std::time::Duration;

  fn settings(base_url: String) -> LlmSettings {
    LlmSettings {
      provider: Provider::Gemini,
      api_key: "g-test".into(),
      base_url,
      model: "gemini-2.5-flash".into(),
      timeout: Duration::from_secs(5),
    }
  }

  fn request() -> CompletionRequest {
    CompletionRequest {
      system: "sys".into(),
      prompt: "Create a workbook".into(),
      temperature: 0.7,
      structured: Some(StructuredOutput { name: "workbook", schema: json!({"type": "OBJECT"}) }),
    }
  }

  #[tokio::test]
  async fn joins_candidate_parts() {
    let server = MockServer::start_async().await;
    let mock = server.mock_async(|when, then| {
      when.method(POST)
        .path("/models/gemini-2.5-flash:generateContent")
        .header("x-goog-api-key", "g-test");
      then.status(200)
        .header("content-type", "application/json")
        .json_body(json!({
          "candidates": [{
            "content": { "role": "model", "parts": [{ "text": "{\"topic\":" }, { "text": "\"Rust\"}" }] },
            "finishReason": "STOP"
          }],
          "usageMetadata": { "promptTokenCount": 12, "candidatesTokenCount": 30, "totalTokenCount": 42 }
        }));
    }).await;

    let g = Gemini::new(reqwest::Client::new(), &settings(server.base_url()));
    let text = g.complete(request()).await.unwrap();
    assert_eq!(text, "{\"topic\":\"Rust\"}");
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn non_success_status_carries_provider_message() {
    let server = MockServer::start_async().await;
    server.mock_async(|when, then| {
      when.method(POST).path("/models/gemini-2.5-flash:generateContent");
      then.status(400).json_body(json!({
        "error": { "code": 400, "message": "API key not valid. Please pass a valid API key.", "status": "INVALID_ARGUMENT" }
      }));
    }).await;

    let g = Gemini::new(reqwest::Client::new(), &settings(server.base_url()));
    match g.complete(request()).await {
      Err(UpstreamError::Status { status, message }) => {
        assert_eq!(status, 400);
        assert!(message.starts_with("API key not valid"));
      }
      other => panic!("unexpected result: {:?}", other),
    }
  }

  #[tokio::test]
  async fn blocked_prompt_without_candidates_is_empty_content() {
    let server = MockServer::start_async().await;
    server.mock_async(|when, then| {
      when.method(POST).path("/models/gemini-2.5-flash:generateContent");
      then.status(200).json_body(json!({ "promptFeedback": { "blockReason": "SAFETY" } }));
    }).await;

    let g = Gemini::new(reqwest::Client::new(), &settings(server.base_url()));
    assert!(matches!(g.complete(request()).await, Err(UpstreamError::EmptyContent)));
  }

  #[test]
  fn request_body_uses_camel_case_generation_config() {
    let body = GenerateContentRequest {
      system_instruction: Content { role: None, parts: vec![Part { text: "s".into() }] },
      contents: vec![],
      generation_config: GenerationConfig {
        temperature: 0.5,
        response_mime_type: Some("application/json".into()),
        response_schema: Some(json!({"type": "OBJECT"})),
      },
    };
    let v = serde_json::to_value(&body).unwrap();
    assert_eq!(v["generationConfig"]["responseMimeType"], "application/json");
    assert_eq!(v["generationConfig"]["responseSchema"]["type"], "OBJECT");
    assert!(v["systemInstruction"].get("role").is_none());
  }
}
