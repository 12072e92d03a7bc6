//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;
use axum::{extract::State, http::StatusCode, Json, response::{IntoResponse, Response}};
use tracing::{info, instrument};

use crate::error::{AnalysisError, GenerationError, ServiceFault, UpstreamError};
use crate::protocol::*;
use crate::state::AppState;
use crate::logic::*;

/// Error body plus status, built from a workflow error.
pub struct ApiError {
  status: StatusCode,
  body: ErrorOut,
}

fn service_status(fault: &ServiceFault) -> StatusCode {
  match fault {
    ServiceFault::Upstream(UpstreamError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
    _ => StatusCode::BAD_GATEWAY,
  }
}

impl From<GenerationError> for ApiError {
  fn from(e: GenerationError) -> Self {
    let status = match &e {
      GenerationError::InvalidTopic(_) => StatusCode::BAD_REQUEST,
      GenerationError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
      GenerationError::Service(f) => service_status(f),
    };
    Self { status, body: ErrorOut { retryable: e.is_retryable(), message: e.to_string() } }
  }
}

impl From<AnalysisError> for ApiError {
  fn from(e: AnalysisError) -> Self {
    let status = match &e {
      AnalysisError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
      AnalysisError::Service(f) => service_status(f),
    };
    Self { status, body: ErrorOut { retryable: e.is_retryable(), message: e.to_string() } }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    (self.status, Json(self.body)).into_response()
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, configured: state.configured })
}

#[instrument(level = "info", skip(state, body), fields(topic = %body.topic))]
pub async fn http_post_workbook(
  State(state): State<Arc<AppState>>,
  Json(body): Json<WorkbookIn>,
) -> Result<Json<WorkbookOut>, ApiError> {
  let wb = generate_workbook(&state, &body.topic).await?;
  info!(target: "workbook", topic = %wb.topic, problems = wb.problems.len(), "HTTP workbook served");
  Ok(Json(to_out(&wb)))
}

#[instrument(level = "info", skip(state, body), fields(question_len = body.question.len(), answer_len = body.answer.len()))]
pub async fn http_post_analysis(
  State(state): State<Arc<AppState>>,
  Json(body): Json<AnalysisIn>,
) -> Result<Json<AnalysisOut>, ApiError> {
  let analysis = analyze_answer(&state, &body).await?;
  info!(target: "analysis", analysis_len = analysis.len(), "HTTP analysis served");
  Ok(Json(AnalysisOut::new(analysis)))
}
