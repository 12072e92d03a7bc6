//! Expertise Workbook · leveled practice problems with AI critique
//!
//! - Axum HTTP + WebSocket API
//! - Gemini or OpenAI as the upstream model (via environment variables)
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT              : u16 (default 3000)
//!   LLM_PROVIDER      : "gemini" (default) or "openai"
//!   GEMINI_API_KEY    : credential for gemini (API_KEY is accepted as a fallback)
//!   OPENAI_API_KEY    : credential for openai
//!   LLM_BASE_URL      : provider API root (defaults per provider)
//!   LLM_MODEL         : default "gemini-2.5-flash" / "gpt-4o-mini"
//!   LLM_TIMEOUT_SECS  : per-request timeout (default 30)
//!   AGENT_CONFIG_PATH : path to TOML config (prompts + workbook settings)
//!   LOG_LEVEL         : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT        : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod error;
mod config;
mod schema;
mod upstream;
mod gemini;
mod openai;
mod generator;
mod analyzer;
mod render;
mod session;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared application state (prompts, settings, upstream backend).
  let state = Arc::new(AppState::new());

  let app = build_router(state);

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "expertise_workbook", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(target: "expertise_workbook", error = %e, "Failed to listen for Ctrl-C");
    std::future::pending::<()>().await;
  }
  info!(target: "expertise_workbook", "Shutdown signal received");
}
