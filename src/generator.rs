//! Workbook generation: topic → prompt + schema → model → validated, sorted workbook.
//!
//! The model's JSON is never trusted as-is. It is decoded into a raw shape in
//! which every field is optional, then checked field by field against the
//! same required-field list the schema was built from. Any violation fails
//! the whole generation; there is no partial workbook.

use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info, instrument, warn};

use crate::config::{Prompts, WorkbookSettings};
use crate::domain::{Level, LevelScheme, Problem, Workbook};
use crate::error::{ConfigError, GenerationError, SchemaViolation, ServiceFault};
use crate::schema::{problem_fields, workbook_schema};
use crate::upstream::{CompletionRequest, SharedBackend, StructuredOutput};
use crate::util::{fill_template, trunc_for_log};

pub const MAX_TOPIC_CHARS: usize = 200;

#[derive(Clone)]
pub struct WorkbookGenerator {
  backend: Result<SharedBackend, ConfigError>,
  prompts: Prompts,
  settings: WorkbookSettings,
}

impl WorkbookGenerator {
  pub fn new(
    backend: Result<SharedBackend, ConfigError>,
    prompts: Prompts,
    settings: WorkbookSettings,
  ) -> Self {
    Self { backend, prompts, settings }
  }

  pub fn build_prompt(&self, topic: &str) -> String {
    let guidance = match self.settings.level_scheme {
      LevelScheme::Numeric => &self.prompts.numeric_level_guidance,
      LevelScheme::Tiered => &self.prompts.tiered_level_guidance,
    };
    let count = self.settings.requested_problems().to_string();
    fill_template(
      &self.prompts.generation_template,
      &[("topic", topic), ("problem_count", &count), ("level_guidance", guidance)],
    )
  }

  /// Generate a workbook for `topic`.
  ///
  /// Configuration problems are returned before any request is made.
  #[instrument(level = "info", skip(self), fields(scheme = ?self.settings.level_scheme))]
  pub async fn generate(&self, topic: &str) -> Result<Workbook, GenerationError> {
    let topic = normalize_topic(topic)?;
    let backend = self.backend.as_ref().map_err(|e| {
      error!(target: "workbook", error = %e, "Generation refused: upstream not configured");
      GenerationError::Configuration(e.clone())
    })?;

    let scheme = self.settings.level_scheme;
    let max = self.settings.max_problems.max(1);
    let req = CompletionRequest {
      system: self.prompts.generation_system.clone(),
      prompt: self.build_prompt(&topic),
      temperature: self.settings.generation_temperature,
      structured: Some(StructuredOutput {
        name: "workbook",
        schema: workbook_schema(scheme, backend.dialect(), max),
      }),
    };

    let start = std::time::Instant::now();
    let result = match backend.complete(req).await {
      Ok(text) => validate_workbook(&text, scheme, max).map_err(|v| {
        warn!(target: "workbook", response_preview = %trunc_for_log(&text, 160), "Rejected workbook response");
        ServiceFault::from(v)
      }),
      Err(e) => Err(ServiceFault::from(e)),
    };
    let elapsed = start.elapsed();

    let mut workbook = match result {
      Ok(wb) => wb,
      Err(fault) => {
        error!(target: "workbook", %topic, provider = backend.name(), model = backend.model(), ?elapsed, error = %fault, retryable = fault.is_retryable(), "Workbook generation failed");
        return Err(GenerationError::Service(fault));
      }
    };

    if workbook.topic != topic {
      warn!(target: "workbook", requested = %topic, returned = %workbook.topic, "Model returned a different topic; keeping the requested one");
      workbook.topic = topic;
    }

    info!(
      target: "workbook",
      topic = %workbook.topic,
      problems = workbook.problems.len(),
      ?elapsed,
      "Workbook generated"
    );
    Ok(workbook)
  }
}

fn normalize_topic(topic: &str) -> Result<String, GenerationError> {
  let topic = topic.trim();
  if topic.is_empty() {
    return Err(GenerationError::InvalidTopic("Please enter a topic.".into()));
  }
  if topic.chars().count() > MAX_TOPIC_CHARS {
    return Err(GenerationError::InvalidTopic(format!(
      "Topics are limited to {} characters.",
      MAX_TOPIC_CHARS
    )));
  }
  Ok(topic.to_string())
}

#[derive(Deserialize)]
struct RawWorkbook {
  #[serde(default)] topic: Option<String>,
  #[serde(default)] problems: Option<Vec<RawProblem>>,
}

#[derive(Deserialize)]
struct RawProblem {
  #[serde(default)] level: Option<Value>,
  #[serde(default)] title: Option<String>,
  #[serde(default)] description: Option<String>,
  #[serde(default)] question: Option<String>,
  #[serde(default)] solution: Option<String>,
  #[serde(default)] hint: Option<String>,
}

impl RawProblem {
  fn text(&self, field: &str) -> Option<&str> {
    let v = match field {
      "title" => &self.title,
      "description" => &self.description,
      "question" => &self.question,
      "solution" => &self.solution,
      "hint" => &self.hint,
      _ => return None,
    };
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
  }
}

/// Decode and check a workbook response, returning problems sorted easiest first.
pub fn validate_workbook(text: &str, scheme: LevelScheme, max_problems: usize) -> Result<Workbook, SchemaViolation> {
  let raw: RawWorkbook = serde_json::from_str(text)?;

  let topic = raw.topic.ok_or(SchemaViolation::MissingWorkbookField("topic"))?;
  let topic = topic.trim();
  if topic.is_empty() {
    return Err(SchemaViolation::EmptyTopic);
  }
  let raw_problems = raw.problems.ok_or(SchemaViolation::MissingWorkbookField("problems"))?;
  if raw_problems.is_empty() {
    return Err(SchemaViolation::NoProblems);
  }
  if raw_problems.len() > max_problems {
    return Err(SchemaViolation::TooManyProblems { count: raw_problems.len(), max: max_problems });
  }

  let required = problem_fields(scheme);
  let mut problems = Vec::with_capacity(raw_problems.len());
  for (index, rp) in raw_problems.iter().enumerate() {
    for &field in required.iter().filter(|f| **f != "level") {
      if rp.text(field).is_none() {
        return Err(SchemaViolation::MissingField { index, field });
      }
    }

    let level_value = rp.level.as_ref().ok_or(SchemaViolation::MissingField { index, field: "level" })?;
    let level = serde_json::from_value::<Level>(level_value.clone())
      .ok()
      .filter(|l| scheme.accepts(*l))
      .ok_or_else(|| SchemaViolation::UnexpectedLevel {
        index,
        found: level_value.to_string(),
        expected: scheme.expected(),
      })?;

    let owned = |f: &str| rp.text(f).unwrap_or_default().to_string();
    problems.push(Problem {
      level,
      title: owned("title"),
      description: owned("description"),
      question: owned("question"),
      solution: owned("solution"),
      hint: owned("hint"),
    });
  }

  problems.sort_by_key(|p| p.level.rank());
  Ok(Workbook { topic: topic.to_string(), problems })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::Tier;
  use crate::error::{UpstreamError, GENERATION_FAILED_MESSAGE};
  use crate::upstream::fake::{FakeBackend, Reply};
  use serde_json::json;

  fn numeric_problem(level: u8, question: &str) -> Value {
    json!({
      "level": level,
      "title": format!("Problem {}", level),
      "description": "desc",
      "question": question,
      "solution": format!("solution to {}", question),
      "hint": "think",
    })
  }

  fn generator(backend: SharedBackend, scheme: LevelScheme) -> WorkbookGenerator {
    let settings = WorkbookSettings { level_scheme: scheme, ..WorkbookSettings::default() };
    WorkbookGenerator::new(Ok(backend), Prompts::default(), settings)
  }

  #[test]
  fn sorts_problems_stably_by_level() {
    let body = json!({
      "topic": "Graphs",
      "problems": [
        numeric_problem(3, "c"),
        numeric_problem(1, "a"),
        numeric_problem(3, "d"),
        numeric_problem(2, "b"),
      ]
    });
    let wb = validate_workbook(&body.to_string(), LevelScheme::Numeric, 10).unwrap();
    let order: Vec<&str> = wb.problems.iter().map(|p| p.question.as_str()).collect();
    assert_eq!(order, vec!["a", "b", "c", "d"]);
  }

  #[test]
  fn tiered_levels_sort_beginner_to_expert() {
    let body = json!({
      "topic": "SQL",
      "problems": [
        { "level": "Expert", "question": "q3", "solution": "s3" },
        { "level": "Beginner", "question": "q1", "solution": "s1" },
        { "level": "Intermediate", "question": "q2", "solution": "s2" },
      ]
    });
    let wb = validate_workbook(&body.to_string(), LevelScheme::Tiered, 10).unwrap();
    let levels: Vec<Level> = wb.problems.iter().map(|p| p.level).collect();
    assert_eq!(
      levels,
      vec![Level::Tier(Tier::Beginner), Level::Tier(Tier::Intermediate), Level::Tier(Tier::Expert)]
    );
    assert!(wb.problems[0].hint.is_empty());
  }

  #[test]
  fn missing_problems_key_is_rejected() {
    let err = validate_workbook(r#"{"topic":"Rust"}"#, LevelScheme::Numeric, 10).unwrap_err();
    assert!(matches!(err, SchemaViolation::MissingWorkbookField("problems")));
  }

  #[test]
  fn structural_violations_fail_closed() {
    let scheme = LevelScheme::Numeric;
    assert!(matches!(validate_workbook("not json", scheme, 10), Err(SchemaViolation::Malformed(_))));
    assert!(matches!(
      validate_workbook(r#"{"topic":"  ","problems":[]}"#, scheme, 10),
      Err(SchemaViolation::EmptyTopic)
    ));
    assert!(matches!(
      validate_workbook(r#"{"topic":"Rust","problems":[]}"#, scheme, 10),
      Err(SchemaViolation::NoProblems)
    ));
    let too_many = json!({ "topic": "Rust", "problems": (0..3).map(|_| numeric_problem(1, "q")).collect::<Vec<_>>() });
    assert!(matches!(
      validate_workbook(&too_many.to_string(), scheme, 2),
      Err(SchemaViolation::TooManyProblems { count: 3, max: 2 })
    ));
  }

  #[test]
  fn blank_solution_is_a_missing_field() {
    let mut p = numeric_problem(2, "q");
    p["solution"] = json!("   ");
    let body = json!({ "topic": "Rust", "problems": [numeric_problem(1, "a"), p] });
    let err = validate_workbook(&body.to_string(), LevelScheme::Numeric, 10).unwrap_err();
    assert!(matches!(err, SchemaViolation::MissingField { index: 1, field: "solution" }));
  }

  #[test]
  fn levels_outside_the_scheme_are_rejected() {
    let body = json!({ "topic": "Rust", "problems": [numeric_problem(7, "q")] });
    assert!(matches!(
      validate_workbook(&body.to_string(), LevelScheme::Numeric, 10),
      Err(SchemaViolation::UnexpectedLevel { index: 0, .. })
    ));

    let tier_in_numeric = json!({ "topic": "Rust", "problems": [{
      "level": "Expert", "title": "t", "description": "d", "question": "q", "solution": "s", "hint": "h"
    }]});
    assert!(matches!(
      validate_workbook(&tier_in_numeric.to_string(), LevelScheme::Numeric, 10),
      Err(SchemaViolation::UnexpectedLevel { .. })
    ));

    let missing = json!({ "topic": "Rust", "problems": [{ "question": "q", "solution": "s" }] });
    assert!(matches!(
      validate_workbook(&missing.to_string(), LevelScheme::Tiered, 10),
      Err(SchemaViolation::MissingField { field: "level", .. })
    ));
  }

  #[tokio::test]
  async fn binary_search_trees_scenario() {
    let body = json!({
      "topic": "binary search trees",
      "problems": [numeric_problem(2, "insert"), numeric_problem(1, "define"), numeric_problem(4, "balance")]
    });
    let backend = FakeBackend::text(body.to_string());
    let gen = generator(backend.clone(), LevelScheme::Numeric);

    let wb = gen.generate("  Binary Search Trees ").await.unwrap();
    assert_eq!(wb.topic, "Binary Search Trees");
    assert!((3..=5).contains(&wb.problems.len()));
    assert!(wb.problems.windows(2).all(|w| w[0].level.rank() <= w[1].level.rank()));
    assert!(wb.problems.iter().all(|p| !p.question.is_empty() && !p.solution.is_empty()));

    let call = backend.last_call();
    assert!(call.prompt.contains("\"Binary Search Trees\""));
    assert!(call.prompt.contains("exactly 5 problems"));
    let schema = call.structured.expect("structured output requested").schema;
    assert_eq!(schema["required"], json!(["topic", "problems"]));
  }

  #[tokio::test]
  async fn missing_credential_fails_before_any_request() {
    let gen = WorkbookGenerator::new(
      Err(ConfigError::MissingCredential { var: "GEMINI_API_KEY" }),
      Prompts::default(),
      WorkbookSettings::default(),
    );
    let err = gen.generate("Rust").await.unwrap_err();
    assert!(matches!(err, GenerationError::Configuration(ConfigError::MissingCredential { .. })));
  }

  #[tokio::test]
  async fn blank_topic_is_rejected_without_calling_upstream() {
    let backend = FakeBackend::text("{}");
    let gen = generator(backend.clone(), LevelScheme::Numeric);
    assert!(matches!(gen.generate("   ").await, Err(GenerationError::InvalidTopic(_))));
    assert!(matches!(gen.generate(&"x".repeat(MAX_TOPIC_CHARS + 1)).await, Err(GenerationError::InvalidTopic(_))));
    assert_eq!(backend.call_count(), 0);
  }

  #[tokio::test]
  async fn malformed_response_is_an_opaque_service_error() {
    let backend = FakeBackend::text(r#"{"topic":"Rust","problems":"#);
    let gen = generator(backend, LevelScheme::Numeric);
    let err = gen.generate("Rust").await.unwrap_err();
    assert!(matches!(err, GenerationError::Service(ServiceFault::Schema(SchemaViolation::Malformed(_)))));
    assert_eq!(err.to_string(), GENERATION_FAILED_MESSAGE);
    assert!(!err.is_retryable());
  }

  #[tokio::test]
  async fn upstream_failures_map_to_service_errors() {
    let backend = FakeBackend::new(vec![Reply::Status(500, "internal"), Reply::Timeout]);
    let gen = generator(backend, LevelScheme::Tiered);

    let first = gen.generate("Rust").await.unwrap_err();
    assert!(matches!(first, GenerationError::Service(ServiceFault::Upstream(UpstreamError::Status { status: 500, .. }))));
    assert!(!first.is_retryable());

    let second = gen.generate("Rust").await.unwrap_err();
    assert!(second.is_retryable());
    assert_eq!(second.to_string(), GENERATION_FAILED_MESSAGE);
  }

  #[test]
  fn tiered_prompt_asks_for_three_named_levels() {
    let gen = generator(FakeBackend::text(""), LevelScheme::Tiered);
    let prompt = gen.build_prompt("Photosynthesis");
    assert!(prompt.contains("exactly 3 problems"));
    assert!(prompt.contains("\"Beginner\""));
    assert!(prompt.contains("\"Photosynthesis\""));
  }
}
