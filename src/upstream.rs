//! The seam between the workflows and a hosted generative model.
//!
//! A backend takes one prompt (plus an optional structured-output schema) and
//! returns the model's text. Everything provider-specific lives behind
//! `CompletionBackend`; the workflows never see HTTP.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::{LlmSettings, Provider};
use crate::error::{ConfigError, UpstreamError};
use crate::gemini::Gemini;
use crate::openai::OpenAI;
use crate::schema::SchemaDialect;

/// Ask the model to answer with JSON conforming to `schema`.
#[derive(Clone, Debug)]
pub struct StructuredOutput {
  pub name: &'static str,
  pub schema: Value,
}

#[derive(Clone, Debug)]
pub struct CompletionRequest {
  pub system: String,
  pub prompt: String,
  pub temperature: f32,
  pub structured: Option<StructuredOutput>,
}

#[async_trait]
pub trait CompletionBackend: Send + Sync {
  /// Short provider name used in logs.
  fn name(&self) -> &'static str;

  fn model(&self) -> &str;

  /// Which schema flavour `StructuredOutput::schema` must be written in.
  fn dialect(&self) -> SchemaDialect;

  async fn complete(&self, req: CompletionRequest) -> Result<String, UpstreamError>;
}

pub type SharedBackend = Arc<dyn CompletionBackend>;

/// Build the configured backend. Fails without touching the network.
pub fn from_settings(settings: &LlmSettings) -> Result<SharedBackend, ConfigError> {
  let http = reqwest::Client::builder()
    .timeout(settings.timeout)
    .build()
    .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

  let backend: SharedBackend = match settings.provider {
    Provider::Gemini => Arc::new(Gemini::new(http, settings)),
    Provider::OpenAi => Arc::new(OpenAI::new(http, settings)),
  };
  Ok(backend)
}

/// Try to extract a clean error message from a provider error body.
/// Gemini and OpenAI both use `{ "error": { "message": ... } }`.
pub(crate) fn extract_provider_error(body: &str) -> Option<String> {
  #[derive(serde::Deserialize)]
  struct EWrap { error: EObj }
  #[derive(serde::Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn extracts_nested_error_message() {
    let body = r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#;
    assert_eq!(extract_provider_error(body).as_deref(), Some("API key not valid"));
    assert_eq!(extract_provider_error("<html>bad gateway</html>"), None);
  }

  #[test]
  fn builds_the_configured_provider() {
    let mut settings = LlmSettings {
      provider: Provider::Gemini,
      api_key: "k".into(),
      base_url: "http://localhost".into(),
      model: "m".into(),
      timeout: std::time::Duration::from_secs(1),
    };
    let b = from_settings(&settings).unwrap();
    assert_eq!((b.name(), b.dialect()), ("gemini", SchemaDialect::Gemini));

    settings.provider = Provider::OpenAi;
    let b = from_settings(&settings).unwrap();
    assert_eq!((b.name(), b.dialect()), ("openai", SchemaDialect::JsonSchema));
    assert_eq!(b.model(), "m");
  }
}
