//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{Level, Problem, Workbook};
use crate::render::{format_analysis, format_solution};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    GenerateWorkbook {
        topic: String,
    },
    AnalyzeAnswer {
        #[serde(rename = "problemIndex")]
        problem_index: usize,
        answer: String,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Generating {
        #[serde(rename = "requestId")]
        request_id: u64,
        topic: String,
    },
    Workbook {
        #[serde(rename = "requestId")]
        request_id: u64,
        workbook: WorkbookOut,
    },
    GenerationError {
        #[serde(rename = "requestId")]
        request_id: u64,
        message: String,
        retryable: bool,
    },
    Analyzing {
        #[serde(rename = "problemIndex")]
        problem_index: usize,
    },
    Analysis {
        #[serde(rename = "problemIndex")]
        problem_index: usize,
        analysis: String,
        #[serde(rename = "analysisHtml")]
        analysis_html: String,
    },
    AnalysisError {
        #[serde(rename = "problemIndex")]
        problem_index: usize,
        message: String,
        retryable: bool,
    },
    Error {
        message: String,
    },
}

/// DTO used by both WS and HTTP for workbook delivery.
#[derive(Debug, Serialize)]
pub struct WorkbookOut {
    pub topic: String,
    pub problems: Vec<ProblemOut>,
}

#[derive(Debug, Serialize)]
pub struct ProblemOut {
    pub level: Level,
    pub title: String,
    pub description: String,
    pub question: String,
    pub solution: String,
    pub solution_html: String,
    pub hint: String,
}

pub fn problem_out(p: &Problem) -> ProblemOut {
    ProblemOut {
        level: p.level,
        title: p.title.clone(),
        description: p.description.clone(),
        question: p.question.clone(),
        solution: p.solution.clone(),
        solution_html: format_solution(&p.solution),
        hint: p.hint.clone(),
    }
}

/// Convert the internal `Workbook` to the public DTO.
pub fn to_out(wb: &Workbook) -> WorkbookOut {
    WorkbookOut {
        topic: wb.topic.clone(),
        problems: wb.problems.iter().map(problem_out).collect(),
    }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct WorkbookIn {
    pub topic: String,
}

#[derive(Deserialize)]
pub struct AnalysisIn {
    pub topic: String,
    pub question: String,
    pub solution: String,
    pub answer: String,
}

#[derive(Serialize)]
pub struct AnalysisOut {
    pub analysis: String,
    pub analysis_html: String,
}

impl AnalysisOut {
    pub fn new(analysis: String) -> Self {
        let analysis_html = format_analysis(&analysis);
        Self { analysis, analysis_html }
    }
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub configured: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorOut {
    pub message: String,
    pub retryable: bool,
}
