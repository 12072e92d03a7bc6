//! Error types for configuration, the upstream model, response validation, and
//! the two user-facing workflows.
//!
//! Workflow errors split into two kinds. `Configuration` is fatal and carries a
//! descriptive message. `Service` is recoverable: it keeps the underlying fault
//! for logs but displays only a fixed, generic message so provider internals
//! never reach the user.

use thiserror::Error;

pub const GENERATION_FAILED_MESSAGE: &str =
  "Failed to generate the workbook. Please check your API key and try again.";
pub const ANALYSIS_FAILED_MESSAGE: &str =
  "Failed to get expert analysis. The service may be temporarily unavailable.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
  #[error("missing API credential: set {var} in the environment")]
  MissingCredential { var: &'static str },
  #[error("unknown LLM provider '{0}' (expected 'gemini' or 'openai')")]
  UnknownProvider(String),
  #[error("invalid value for {var}: '{value}'")]
  InvalidValue { var: &'static str, value: String },
  #[error("failed to build HTTP client: {0}")]
  HttpClient(String),
}

#[derive(Debug, Error)]
pub enum UpstreamError {
  #[error("upstream request timed out")]
  Timeout,
  #[error("upstream transport error: {0}")]
  Transport(#[source] reqwest::Error),
  #[error("upstream HTTP {status}: {message}")]
  Status { status: u16, message: String },
  #[error("upstream response could not be decoded: {0}")]
  Decode(String),
  #[error("upstream returned no content")]
  EmptyContent,
}

impl From<reqwest::Error> for UpstreamError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_timeout() {
      UpstreamError::Timeout
    } else if e.is_decode() {
      UpstreamError::Decode(e.to_string())
    } else {
      UpstreamError::Transport(e)
    }
  }
}

/// Structural problems in a workbook returned by the model.
#[derive(Debug, Error)]
pub enum SchemaViolation {
  #[error("response is not valid workbook JSON: {0}")]
  Malformed(#[from] serde_json::Error),
  #[error("workbook is missing required field '{0}'")]
  MissingWorkbookField(&'static str),
  #[error("workbook topic is empty")]
  EmptyTopic,
  #[error("workbook contains no problems")]
  NoProblems,
  #[error("workbook contains {count} problems (at most {max} allowed)")]
  TooManyProblems { count: usize, max: usize },
  #[error("problem {index} is missing required field '{field}'")]
  MissingField { index: usize, field: &'static str },
  #[error("problem {index} has level {found}, expected a {expected} level")]
  UnexpectedLevel { index: usize, found: String, expected: &'static str },
}

/// Anything that went wrong after configuration was found to be valid.
#[derive(Debug, Error)]
pub enum ServiceFault {
  #[error(transparent)]
  Upstream(#[from] UpstreamError),
  #[error(transparent)]
  Schema(#[from] SchemaViolation),
}

impl ServiceFault {
  /// Only an expired request is worth resubmitting unchanged.
  pub fn is_retryable(&self) -> bool {
    matches!(self, ServiceFault::Upstream(UpstreamError::Timeout))
  }
}

#[derive(Debug, Error)]
pub enum GenerationError {
  #[error("{0}")]
  InvalidTopic(String),
  #[error("{0}")]
  Configuration(#[from] ConfigError),
  #[error("{}", GENERATION_FAILED_MESSAGE)]
  Service(#[source] ServiceFault),
}

impl GenerationError {
  pub fn is_retryable(&self) -> bool {
    match self {
      GenerationError::Service(fault) => fault.is_retryable(),
      _ => false,
    }
  }
}

impl From<ServiceFault> for GenerationError {
  fn from(f: ServiceFault) -> Self { GenerationError::Service(f) }
}

#[derive(Debug, Error)]
pub enum AnalysisError {
  #[error("{0}")]
  Configuration(#[from] ConfigError),
  #[error("{}", ANALYSIS_FAILED_MESSAGE)]
  Service(#[source] ServiceFault),
}

impl AnalysisError {
  pub fn is_retryable(&self) -> bool {
    match self {
      AnalysisError::Service(fault) => fault.is_retryable(),
      AnalysisError::Configuration(_) => false,
    }
  }
}

impl From<ServiceFault> for AnalysisError {
  fn from(f: ServiceFault) -> Self { AnalysisError::Service(f) }
}
