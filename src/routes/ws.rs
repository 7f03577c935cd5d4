//! WebSocket upgrade + message loop. A connection owns one course session for
//! its lifetime: created on connect, ended on disconnect. Each client message
//! is parsed as JSON, forwarded to core logic, and answered with one message.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{debug, error, info, instrument};

use crate::logic::{self, Action};
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::state::{AppState, SessionHandle};

#[instrument(level = "info", skip(ws, state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "manager_course", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  let (session_id, session) = state.create_session().await;
  info!(target: "manager_course", %session_id, "WebSocket connected");

  let hello = ServerWsMessage::Session { session_id, view: logic::current_view(&session).await };
  if send(&mut socket, &hello).await {
    while let Some(Ok(msg)) = socket.recv().await {
      match msg {
        Message::Text(txt) => {
          let reply = match serde_json::from_str::<ClientWsMessage>(&txt) {
            Ok(incoming) => {
              debug!(target: "manager_course", %session_id, msg_len = txt.len(), "WS message received");
              handle_client_ws(incoming, &state, &session).await
            }
            Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
          };
          if !send(&mut socket, &reply).await {
            break;
          }
        }
        Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
        Message::Close(_) => break,
        _ => {}
      }
    }
  }

  state.end_session(&session_id).await;
  info!(target: "manager_course", %session_id, "WebSocket disconnected");
}

/// Serialize and send; false once the socket is unusable.
async fn send(socket: &mut WebSocket, msg: &ServerWsMessage) -> bool {
  let out = serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
  });
  match socket.send(Message::Text(out)).await {
    Ok(()) => true,
    Err(e) => {
      error!(target: "manager_course", error = %e, "WS send error");
      false
    }
  }
}

#[instrument(level = "info", skip_all)]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState, session: &SessionHandle) -> ServerWsMessage {
  let action = match msg {
    ClientWsMessage::Ping => return ServerWsMessage::Pong,
    ClientWsMessage::GetState => return ServerWsMessage::State { view: logic::current_view(session).await },
    ClientWsMessage::Topics => return ServerWsMessage::Topics { topics: logic::topics() },
    ClientWsMessage::Leaderboard => {
      return match logic::leaderboard(state).await {
        Ok(entries) => ServerWsMessage::Leaderboard { entries },
        Err(e) => ServerWsMessage::Error { message: e.to_string() },
      };
    }
    ClientWsMessage::StartCourse { topic } => Action::StartCourse { topic },
    ClientWsMessage::NextModule => Action::NextModule,
    ClientWsMessage::UpdateAnswer { answer } => Action::UpdateAnswer { answer },
    ClientWsMessage::SubmitTest { answer } => Action::SubmitTest { answer },
    ClientWsMessage::Restart => Action::Restart,
    ClientWsMessage::NewPractice { topic } => Action::NewPractice { topic },
    ClientWsMessage::SubmitChoice { player, answer } => Action::SubmitChoice { player, answer },
  };

  let is_choice = matches!(action, Action::SubmitChoice { .. });
  match logic::apply(state, session, action).await {
    Ok(out) if is_choice => ServerWsMessage::ChoiceResult { view: out.view, leaderboard_entry: out.leaderboard_entry },
    Ok(out) => ServerWsMessage::State { view: out.view },
    Err(e) => ServerWsMessage::Error { message: e.to_string() },
  }
}
