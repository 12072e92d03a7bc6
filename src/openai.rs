//! Minimal OpenAI chat.completions backend.
//!
//! Requests either plain text or a strict `json_schema` response format.
//! Calls are instrumented and log model names, latencies, and response sizes (not contents).
//!
//! NOTE: We never log the API key.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::config::LlmSettings;
use crate::error::UpstreamError;
use crate::schema::SchemaDialect;
use crate::upstream::{extract_provider_error, CompletionBackend, CompletionRequest};
use crate::util::trunc_for_log;

#[derive(Clone)]
pub struct OpenAI {
  client: reqwest::Client,
  api_key: String,
  pub base_url: String,
  pub model: String,
}

impl OpenAI {
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
impl CompletionBackend for OpenAI {
  fn name(&self) -> &'static str { "openai" }

  fn model(&self) -> &str { &self.model }

  fn dialect(&self) -> SchemaDialect { SchemaDialect::JsonSchema }

  #[instrument(level = "info", skip(self, req), fields(model = %self.model, structured = req.structured.is_some(), prompt_len = req.prompt.len()))]
  async fn complete(&self, req: CompletionRequest) -> Result<String, UpstreamError> {
    let url = format!("{}/chat/completions", self.base_url);
    let body = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: req.system },
        ChatMessageReq { role: "user".into(), content: req.prompt },
      ],
      temperature: req.temperature,
      response_format: req.structured.map(|s| ResponseFormat {
        r#type: "json_schema".into(),
        json_schema: JsonSchemaFormat { name: s.name.into(), strict: true, schema: s.schema },
      }),
    };

    let start = Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "expertise-workbook/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&body).send().await?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let message = extract_provider_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
      return Err(UpstreamError::Status { status: status.as_u16(), message });
    }

    let body: ChatCompletionResponse = res.json().await?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let choice = body.choices.into_iter().next().ok_or(UpstreamError::EmptyContent)?;
    if let Some(reason) = choice.finish_reason.as_deref().filter(|r| *r != "stop") {
      warn!(finish_reason = %reason, "OpenAI completion did not finish normally");
    }
    let text = choice.message.content.unwrap_or_default();
    info!(elapsed = ?start.elapsed(), response_len = text.len(), "OpenAI response received");
    Ok(text)
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat {
  #[serde(rename = "type")] r#type: String,
  json_schema: JsonSchemaFormat,
}
#[derive(Serialize)]
struct JsonSchemaFormat { name: String, strict: bool, schema: Value }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice {
  message: ChatMessageResp,
  #[serde(default)] finish_reason: Option<String>,
}
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}
