//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - One-shot generation and analysis (HTTP)
//!   - Session-driven generation and analysis (WebSocket), run as spawned tasks
//!     whose results are applied through the session's token guard

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, instrument};

use crate::domain::Workbook;
use crate::error::{AnalysisError, GenerationError};
use crate::protocol::{to_out, AnalysisIn, ServerWsMessage};
use crate::render::format_analysis;
use crate::session::{AnalysisState, Resolution, Session, WorkbookState};
use crate::state::AppState;

pub type SharedSession = Arc<Mutex<Session>>;
pub type Outbox = mpsc::UnboundedSender<ServerWsMessage>;

#[instrument(level = "info", skip(state))]
pub async fn generate_workbook(state: &AppState, topic: &str) -> Result<Workbook, GenerationError> {
  state.generator.generate(topic).await
}

#[instrument(level = "info", skip_all, fields(answer_len = input.answer.len()))]
pub async fn analyze_answer(state: &AppState, input: &AnalysisIn) -> Result<String, AnalysisError> {
  state
    .analyzer
    .analyze(&input.topic, &input.question, &input.solution, &input.answer)
    .await
}

fn send(outbox: &Outbox, msg: ServerWsMessage) {
  if outbox.send(msg).is_err() {
    debug!(target: "session", "Client gone; dropping message");
  }
}

/// Start a generation for this session. Acknowledges immediately; the result
/// follows on `outbox` unless a newer generation has superseded it.
#[instrument(level = "info", skip(state, session, outbox))]
pub async fn start_generation(state: Arc<AppState>, session: SharedSession, topic: String, outbox: Outbox) {
  let topic = topic.trim().to_string();
  let ticket = session.lock().await.begin_generation(&topic);
  send(&outbox, ServerWsMessage::Generating { request_id: ticket.token, topic: topic.clone() });

  tokio::spawn(async move {
    let result = state.generator.generate(&topic).await;
    let mut s = session.lock().await;
    if s.finish_generation(ticket, result) == Resolution::Stale {
      return;
    }
    let msg = match s.state() {
      WorkbookState::Displaying { workbook, .. } => {
        info!(target: "workbook", request_id = ticket.token, topic = %workbook.topic, "WS workbook delivered");
        ServerWsMessage::Workbook { request_id: ticket.token, workbook: to_out(workbook) }
      }
      WorkbookState::Failed { message, retryable, .. } => ServerWsMessage::GenerationError {
        request_id: ticket.token,
        message: message.clone(),
        retryable: *retryable,
      },
      WorkbookState::Idle | WorkbookState::Generating { .. } => return,
    };
    drop(s);
    send(&outbox, msg);
  });
}

/// Start analysing `answer` for one problem of the displayed workbook.
#[instrument(level = "info", skip(state, session, answer, outbox), fields(answer_len = answer.len()))]
pub async fn start_analysis(
  state: Arc<AppState>,
  session: SharedSession,
  problem_index: usize,
  answer: String,
  outbox: Outbox,
) {
  if answer.trim().is_empty() {
    send(&outbox, ServerWsMessage::Error { message: "Please enter an answer first.".into() });
    return;
  }

  let (ticket, topic, question, solution) = {
    let mut s = session.lock().await;
    let ticket = match s.begin_analysis(problem_index) {
      Ok(t) => t,
      Err(e) => {
        send(&outbox, ServerWsMessage::Error { message: e.to_string() });
        return;
      }
    };
    let topic = s.workbook().map(|wb| wb.topic.clone()).unwrap_or_default();
    let Some(problem) = s.problem(problem_index) else { return };
    (ticket, topic, problem.question.clone(), problem.solution.clone())
  };
  send(&outbox, ServerWsMessage::Analyzing { problem_index });

  tokio::spawn(async move {
    let result = state.analyzer.analyze(&topic, &question, &solution, &answer).await;
    let mut s = session.lock().await;
    if s.finish_analysis(ticket, result) == Resolution::Stale {
      return;
    }
    let msg = match s.analysis(problem_index) {
      AnalysisState::Shown { analysis } => ServerWsMessage::Analysis {
        problem_index,
        analysis_html: format_analysis(&analysis),
        analysis,
      },
      AnalysisState::Failed { message, retryable } => ServerWsMessage::AnalysisError { problem_index, message, retryable },
      AnalysisState::Idle | AnalysisState::Analyzing { .. } => return,
    };
    drop(s);
    send(&outbox, msg);
  });
}
