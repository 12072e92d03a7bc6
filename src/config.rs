//! Configuration: upstream model settings from the environment, plus optional
//! prompt and workbook overrides loaded from TOML.
//!
//! See `AgentConfig`, `Prompts` and `WorkbookSettings` for the TOML schema.

use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::LevelScheme;
use crate::error::ConfigError;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_PROBLEMS: usize = 10;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AgentConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub workbook: WorkbookSettings,
}

/// Prompt templates sent to the model. Placeholders use `{key}` syntax.
///
/// Generation: `{topic}`, `{problem_count}`, `{level_guidance}`.
/// Analysis: `{topic}`, `{question}`, `{solution}`, `{user_answer}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub generation_system: String,
  pub generation_template: String,
  pub numeric_level_guidance: String,
  pub tiered_level_guidance: String,
  pub analysis_system: String,
  pub analysis_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      generation_system: "You are an expert educator who writes rigorous, leveled practice workbooks. Respond ONLY with JSON matching the provided schema.".into(),
      generation_template: r#"Create an expertise workbook for the topic: "{topic}".
The workbook should contain exactly {problem_count} problems. {level_guidance}
Each problem must include a detailed question and a comprehensive solution.
The solution should not just give the answer, but also explain the reasoning behind it.

To ensure a comprehensive test, please generate a DIVERSE set of problems. For example, include a mix of the following types:
- A definition-based question (e.g., "What is...? Explain the core concept.")
- An application-based question (e.g., "How would you use X to solve Y? Provide a code sample or practical steps.")
- A debugging or troubleshooting question (e.g., "This code/scenario is broken. Identify the problem and explain how to fix it.")

For the topic "{topic}", generate these problems and ensure the topic in the response matches the requested topic exactly."#.into(),
      numeric_level_guidance: "Assign each problem an integer level from 1 (beginner) to 5 (expert), ordered from easiest to hardest. Give every problem a short title, a one-sentence description, and a hint that nudges without revealing the solution.".into(),
      tiered_level_guidance: "Use one \"Beginner\", one \"Intermediate\", and one \"Expert\" level problem.".into(),
      analysis_system: "You are a demanding but fair subject-matter expert reviewing a learner's answer.".into(),
      analysis_template: r#"As an expert in "{topic}", provide a succinct, critical analysis of the following user's answer to a problem.

**The Problem:**
{question}

**The Ideal Solution:**
{solution}

**The User's Submitted Answer:**
{user_answer}

---

Please structure your feedback in the following format, using markdown for lists and bolding:

**Key Strengths:**
- List the key concepts or solutions the user correctly identified.

**Areas for Improvement:**
- List the key weaknesses, inaccuracies, or missing details in the user's answer.

**Alignment with Optimal Solution:**
- Provide a short summary (1-2 sentences) of how well the user's solution aligns with the ideal solution.

**Competency Focus (if applicable):**
- If the user's solution is fundamentally incorrect or misses the core concept, identify the key competency they seem to be lacking. Politely advise them to review this specific area within "{topic}". If the answer is reasonably good, omit this section."#.into(),
    }
  }
}

/// Shape of generated workbooks and sampling temperatures.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct WorkbookSettings {
  pub level_scheme: LevelScheme,
  /// Problems requested per workbook; defaults to one per level of the scheme.
  pub problem_count: Option<usize>,
  /// Upper bound accepted from the model.
  pub max_problems: usize,
  pub generation_temperature: f32,
  pub analysis_temperature: f32,
}

impl Default for WorkbookSettings {
  fn default() -> Self {
    Self {
      level_scheme: LevelScheme::default(),
      problem_count: None,
      max_problems: DEFAULT_MAX_PROBLEMS,
      generation_temperature: 0.7,
      analysis_temperature: 0.3,
    }
  }
}

impl WorkbookSettings {
  pub fn requested_problems(&self) -> usize {
    self
      .problem_count
      .unwrap_or_else(|| self.level_scheme.default_problem_count())
      .clamp(1, self.max_problems.max(1))
  }
}

/// Attempt to load `AgentConfig` from AGENT_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_agent_config_from_env() -> Option<AgentConfig> {
  let path = std::env::var("AGENT_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AgentConfig>(&s) {
      Ok(cfg) => {
        info!(target: "expertise_workbook", %path, "Loaded agent config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "expertise_workbook", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "expertise_workbook", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provider {
  Gemini,
  OpenAi,
}

impl Provider {
  pub fn as_str(self) -> &'static str {
    match self {
      Provider::Gemini => "gemini",
      Provider::OpenAi => "openai",
    }
  }
}

/// Connection settings for the upstream model.
///
/// Not `Debug`: holds the API key.
#[derive(Clone)]
pub struct LlmSettings {
  pub provider: Provider,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
  pub timeout: Duration,
}

impl LlmSettings {
  pub fn from_env() -> Result<Self, ConfigError> {
    Self::from_lookup(|k| std::env::var(k).ok())
  }

  /// Build settings from any key lookup. Blank values count as absent.
  pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
  where
    F: Fn(&str) -> Option<String>,
  {
    let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    let provider = match get("LLM_PROVIDER").map(|p| p.to_ascii_lowercase()).as_deref() {
      None | Some("gemini") | Some("google") => Provider::Gemini,
      Some("openai") => Provider::OpenAi,
      Some(other) => return Err(ConfigError::UnknownProvider(other.to_string())),
    };

    let (api_key, default_base, default_model) = match provider {
      Provider::Gemini => (
        get("GEMINI_API_KEY")
          .or_else(|| get("API_KEY"))
          .ok_or(ConfigError::MissingCredential { var: "GEMINI_API_KEY" })?,
        "https://generativelanguage.googleapis.com/v1beta",
        "gemini-2.5-flash",
      ),
      Provider::OpenAi => (
        get("OPENAI_API_KEY").ok_or(ConfigError::MissingCredential { var: "OPENAI_API_KEY" })?,
        "https://api.openai.com/v1",
        "gpt-4o-mini",
      ),
    };

    let timeout_secs = match get("LLM_TIMEOUT_SECS") {
      None => DEFAULT_TIMEOUT_SECS,
      Some(v) => match v.parse::<u64>() {
        Ok(n) if n > 0 => n,
        _ => return Err(ConfigError::InvalidValue { var: "LLM_TIMEOUT_SECS", value: v }),
      },
    };

    Ok(Self {
      provider,
      api_key,
      base_url: get("LLM_BASE_URL")
        .unwrap_or_else(|| default_base.into())
        .trim_end_matches('/')
        .to_string(),
      model: get("LLM_MODEL").unwrap_or_else(|| default_model.into()),
      timeout: Duration::from_secs(timeout_secs),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> =
      pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    move |k| map.get(k).cloned()
  }

  #[test]
  fn missing_gemini_key_is_a_configuration_error() {
    let err = LlmSettings::from_lookup(lookup(&[])).err().unwrap();
    assert_eq!(err, ConfigError::MissingCredential { var: "GEMINI_API_KEY" });
  }

  #[test]
  fn blank_key_counts_as_missing() {
    let err = LlmSettings::from_lookup(lookup(&[("LLM_PROVIDER", "openai"), ("OPENAI_API_KEY", "  ")]))
      .err()
      .unwrap();
    assert_eq!(err, ConfigError::MissingCredential { var: "OPENAI_API_KEY" });
  }

  #[test]
  fn gemini_defaults_and_api_key_fallback() {
    let s = LlmSettings::from_lookup(lookup(&[("API_KEY", "k")])).unwrap();
    assert_eq!(s.provider, Provider::Gemini);
    assert_eq!(s.api_key, "k");
    assert_eq!(s.model, "gemini-2.5-flash");
    assert_eq!(s.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
  }

  #[test]
  fn openai_overrides_are_applied() {
    let s = LlmSettings::from_lookup(lookup(&[
      ("LLM_PROVIDER", "OpenAI"),
      ("OPENAI_API_KEY", "sk"),
      ("LLM_BASE_URL", "http://localhost:9000/v1/"),
      ("LLM_MODEL", "gpt-4o"),
      ("LLM_TIMEOUT_SECS", "5"),
    ]))
    .unwrap();
    assert_eq!(s.provider, Provider::OpenAi);
    assert_eq!(s.base_url, "http://localhost:9000/v1");
    assert_eq!(s.model, "gpt-4o");
    assert_eq!(s.timeout, Duration::from_secs(5));
  }

  #[test]
  fn rejects_unknown_provider_and_bad_timeout() {
    assert!(matches!(
      LlmSettings::from_lookup(lookup(&[("LLM_PROVIDER", "llama")])),
      Err(ConfigError::UnknownProvider(_))
    ));
    assert!(matches!(
      LlmSettings::from_lookup(lookup(&[("API_KEY", "k"), ("LLM_TIMEOUT_SECS", "0")])),
      Err(ConfigError::InvalidValue { var: "LLM_TIMEOUT_SECS", .. })
    ));
  }

  #[test]
  fn toml_overrides_merge_with_defaults() {
    let cfg: AgentConfig = toml::from_str(
      r#"
      [workbook]
      level_scheme = "tiered"

      [prompts]
      analysis_system = "Be brief."
      "#,
    )
    .unwrap();
    assert_eq!(cfg.workbook.level_scheme, LevelScheme::Tiered);
    assert_eq!(cfg.workbook.requested_problems(), 3);
    assert_eq!(cfg.prompts.analysis_system, "Be brief.");
    assert!(cfg.prompts.generation_template.contains("{topic}"));
  }

  #[test]
  fn requested_problems_is_clamped_to_max() {
    let s = WorkbookSettings { problem_count: Some(40), ..WorkbookSettings::default() };
    assert_eq!(s.requested_problems(), DEFAULT_MAX_PROBLEMS);
    assert_eq!(WorkbookSettings::default().requested_problems(), 5);
  }
}
