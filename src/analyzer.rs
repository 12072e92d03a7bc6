//! Answer analysis: critique a learner's answer against the reference solution.
//!
//! The returned text is narrative markdown and is passed through unvalidated,
//! apart from trimming. A blank reply is a failure, never an empty success.

use tracing::{error, info, instrument};

use crate::config::{Prompts, WorkbookSettings};
use crate::error::{AnalysisError, ConfigError, ServiceFault, UpstreamError};
use crate::upstream::{CompletionRequest, SharedBackend};
use crate::util::fill_template;

#[derive(Clone)]
pub struct AnswerAnalyzer {
  backend: Result<SharedBackend, ConfigError>,
  prompts: Prompts,
  temperature: f32,
}

impl AnswerAnalyzer {
  pub fn new(backend: Result<SharedBackend, ConfigError>, prompts: Prompts, settings: &WorkbookSettings) -> Self {
    Self { backend, prompts, temperature: settings.analysis_temperature }
  }

  pub fn build_prompt(&self, topic: &str, question: &str, solution: &str, user_answer: &str) -> String {
    fill_template(
      &self.prompts.analysis_template,
      &[
        ("topic", topic),
        ("question", question),
        ("solution", solution),
        ("user_answer", user_answer),
      ],
    )
  }

  #[instrument(level = "info", skip_all, fields(topic_len = topic.len(), question_len = question.len(), answer_len = user_answer.len()))]
  pub async fn analyze(
    &self,
    topic: &str,
    question: &str,
    solution: &str,
    user_answer: &str,
  ) -> Result<String, AnalysisError> {
    let backend = self.backend.as_ref().map_err(|e| {
      error!(target: "analysis", error = %e, "Analysis refused: upstream not configured");
      AnalysisError::Configuration(e.clone())
    })?;

    let req = CompletionRequest {
      system: self.prompts.analysis_system.clone(),
      prompt: self.build_prompt(topic, question, solution, user_answer),
      temperature: self.temperature,
      structured: None,
    };

    let start = std::time::Instant::now();
    let result = backend
      .complete(req)
      .await
      .and_then(|text| {
        let text = text.trim().to_string();
        if text.is_empty() { Err(UpstreamError::EmptyContent) } else { Ok(text) }
      });
    let elapsed = start.elapsed();

    match result {
      Ok(text) => {
        info!(target: "analysis", ?elapsed, analysis_len = text.len(), "Answer analyzed");
        Ok(text)
      }
      Err(e) => {
        let fault = ServiceFault::from(e);
        error!(target: "analysis", provider = backend.name(), model = backend.model(), ?elapsed, error = %fault, retryable = fault.is_retryable(), "Answer analysis failed");
        Err(AnalysisError::Service(fault))
      }
    }
  }
}
