//! Per-client view state, guarded by request tokens.
//!
//! Every request is issued a fresh token. When it resolves, its result is
//! applied only if the token is still the latest one for that slot: the
//! workbook slot for generations, one slot per problem for analyses. A new
//! generation also supersedes every analysis started against the previous
//! workbook. Stale results are dropped, which is the only form of
//! cancellation there is.

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use crate::domain::{Problem, Workbook};
use crate::error::{AnalysisError, GenerationError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GenerationTicket {
  pub token: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnalysisTicket {
  pub generation: u64,
  pub problem_index: usize,
  pub token: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum WorkbookState {
  Idle,
  Generating { token: u64, topic: String },
  Displaying { token: u64, workbook: Workbook },
  Failed { token: u64, message: String, retryable: bool },
}

#[derive(Clone, Debug, PartialEq, Default)]
pub enum AnalysisState {
  #[default]
  Idle,
  Analyzing { token: u64 },
  Shown { analysis: String },
  Failed { message: String, retryable: bool },
}

/// Whether a resolved request changed the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
  Applied,
  Stale,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
  #[error("No workbook is displayed yet.")]
  NoWorkbook,
  #[error("Unknown problem #{0}.")]
  UnknownProblem(usize),
}

#[derive(Debug)]
pub struct Session {
  next_token: u64,
  state: WorkbookState,
  analyses: HashMap<usize, AnalysisState>,
}

impl Default for Session {
  fn default() -> Self { Self::new() }
}

impl Session {
  pub fn new() -> Self {
    Self { next_token: 1, state: WorkbookState::Idle, analyses: HashMap::new() }
  }

  fn issue(&mut self) -> u64 {
    let t = self.next_token;
    self.next_token += 1;
    t
  }

  pub fn state(&self) -> &WorkbookState { &self.state }

  pub fn workbook(&self) -> Option<&Workbook> {
    match &self.state {
      WorkbookState::Displaying { workbook, .. } => Some(workbook),
      _ => None,
    }
  }

  pub fn problem(&self, index: usize) -> Option<&Problem> {
    self.workbook().and_then(|wb| wb.problems.get(index))
  }

  pub fn analysis(&self, index: usize) -> AnalysisState {
    self.analyses.get(&index).cloned().unwrap_or_default()
  }

  fn current_generation(&self) -> Option<u64> {
    match &self.state {
      WorkbookState::Idle => None,
      WorkbookState::Generating { token, .. }
      | WorkbookState::Displaying { token, .. }
      | WorkbookState::Failed { token, .. } => Some(*token),
    }
  }

  /// Start a new generation, superseding any outstanding one and clearing analyses.
  pub fn begin_generation(&mut self, topic: &str) -> GenerationTicket {
    let token = self.issue();
    self.state = WorkbookState::Generating { token, topic: topic.to_string() };
    self.analyses.clear();
    GenerationTicket { token }
  }

  pub fn finish_generation(
    &mut self,
    ticket: GenerationTicket,
    result: Result<Workbook, GenerationError>,
  ) -> Resolution {
    let latest = matches!(self.state, WorkbookState::Generating { token, .. } if token == ticket.token);
    if !latest {
      debug!(target: "session", token = ticket.token, current = ?self.current_generation(), "Discarding stale generation result");
      return Resolution::Stale;
    }
    self.state = match result {
      Ok(workbook) => WorkbookState::Displaying { token: ticket.token, workbook },
      Err(e) => WorkbookState::Failed {
        token: ticket.token,
        retryable: e.is_retryable(),
        message: e.to_string(),
      },
    };
    Resolution::Applied
  }

  /// Start analysing one problem of the displayed workbook.
  pub fn begin_analysis(&mut self, problem_index: usize) -> Result<AnalysisTicket, SessionError> {
    let generation = match &self.state {
      WorkbookState::Displaying { token, workbook } => {
        if problem_index >= workbook.problems.len() {
          return Err(SessionError::UnknownProblem(problem_index));
        }
        *token
      }
      _ => return Err(SessionError::NoWorkbook),
    };
    let token = self.issue();
    self.analyses.insert(problem_index, AnalysisState::Analyzing { token });
    Ok(AnalysisTicket { generation, problem_index, token })
  }

  pub fn finish_analysis(
    &mut self,
    ticket: AnalysisTicket,
    result: Result<String, AnalysisError>,
  ) -> Resolution {
    let same_workbook = self.current_generation() == Some(ticket.generation);
    let latest = matches!(
      self.analyses.get(&ticket.problem_index),
      Some(AnalysisState::Analyzing { token }) if *token == ticket.token
    );
    if !same_workbook || !latest {
      debug!(target: "session", problem_index = ticket.problem_index, token = ticket.token, "Discarding stale analysis result");
      return Resolution::Stale;
    }
    let next = match result {
      Ok(analysis) => AnalysisState::Shown { analysis },
      Err(e) => AnalysisState::Failed { retryable: e.is_retryable(), message: e.to_string() },
    };
    self.analyses.insert(ticket.problem_index, next);
    Resolution::Applied
  }
}
