//! WebSocket upgrade + message loop. Each connection owns one `Session`.
//!
//! Client messages are parsed as JSON and forwarded to core logic. Generation
//! and analysis run as spawned tasks that report back through an outbox
//! channel, so several requests can be in flight while the loop keeps reading.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::sync::mpsc;
use tracing::{info, error, instrument, debug};
use uuid::Uuid;

use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::logic::*;
use crate::state::AppState;

#[instrument(level = "info", skip(ws, state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "expertise_workbook", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state), fields(conn = %Uuid::new_v4()))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "expertise_workbook", "WebSocket connected");
  let session = SharedSession::default();
  let (outbox, mut inbox) = mpsc::unbounded_channel::<ServerWsMessage>();

  loop {
    tokio::select! {
      incoming = socket.recv() => {
        let Some(Ok(msg)) = incoming else { break };
        match msg {
          Message::Text(txt) => match serde_json::from_str::<ClientWsMessage>(&txt) {
            Ok(incoming) => {
              debug!(target: "expertise_workbook", "WS received: {:?}", &incoming);
              handle_client_ws(incoming, &state, &session, &outbox).await;
            }
            Err(e) => {
              let _ = outbox.send(ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) });
            }
          },
          Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
          Message::Close(_) => break,
          _ => {}
        }
      }
      Some(reply) = inbox.recv() => {
        let out = serde_json::to_string(&reply).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
        });
        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "expertise_workbook", error = %e, "WS send error");
          break;
        }
      }
    }
  }
  info!(target: "expertise_workbook", "WebSocket disconnected");
}

async fn handle_client_ws(msg: ClientWsMessage, state: &Arc<AppState>, session: &SharedSession, outbox: &Outbox) {
  match msg {
    ClientWsMessage::Ping => {
      let _ = outbox.send(ServerWsMessage::Pong);
    }

    ClientWsMessage::GenerateWorkbook { topic } => {
      start_generation(state.clone(), session.clone(), topic, outbox.clone()).await;
    }

    ClientWsMessage::AnalyzeAnswer { problem_index, answer } => {
      start_analysis(state.clone(), session.clone(), problem_index, answer, outbox.clone()).await;
    }
  }
}
