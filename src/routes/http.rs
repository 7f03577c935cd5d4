//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented; errors come back as `{ "error": "..." }`.

use std::sync::Arc;

use axum::{
  extract::{Path, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::leaderboard::LeaderboardError;
use crate::logic::{self, Action, LogicError};
use crate::protocol::*;
use crate::state::AppState;

/// Error body + status for every failing handler.
pub struct ApiError(LogicError);

impl From<LogicError> for ApiError {
  fn from(e: LogicError) -> Self { Self(e) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self.0 {
      LogicError::UnknownSession => StatusCode::NOT_FOUND,
      LogicError::Action(_) => StatusCode::CONFLICT,
      LogicError::Leaderboard(LeaderboardError::InvalidPlayer(_)) => StatusCode::BAD_REQUEST,
      LogicError::Leaderboard(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
      warn!(target: "manager_course", error = %self.0, "Request failed");
    }
    (status, Json(ErrorOut { error: self.0.to_string() })).into_response()
  }
}

async fn run(state: &AppState, id: Uuid, action: Action) -> Result<Json<SessionView>, ApiError> {
  let session = state.get_session(&id).await.ok_or(LogicError::UnknownSession)?;
  let out = logic::apply(state, &session, action).await?;
  Ok(Json(out.view))
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, sessions: state.session_count().await })
}

#[instrument(level = "info")]
pub async fn http_topics() -> impl IntoResponse { Json(TopicsOut { topics: logic::topics() }) }

#[instrument(level = "info", skip(state))]
pub async fn http_create_session(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let (session_id, session) = state.create_session().await;
  let view = logic::current_view(&session).await;
  (StatusCode::CREATED, Json(SessionCreatedOut { session_id, view }))
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_get_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
  let session = state.get_session(&id).await.ok_or(LogicError::UnknownSession)?;
  Ok(Json(logic::current_view(&session).await))
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_end_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
  if state.end_session(&id).await {
    Ok(StatusCode::NO_CONTENT)
  } else {
    Err(LogicError::UnknownSession.into())
  }
}

#[instrument(level = "info", skip(state, body), fields(%id))]
pub async fn http_start(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
  body: Option<Json<TopicIn>>,
) -> Result<Json<SessionView>, ApiError> {
  let topic = body.and_then(|Json(b)| b.topic);
  run(&state, id, Action::StartCourse { topic }).await
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_next(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
  run(&state, id, Action::NextModule).await
}

#[instrument(level = "info", skip(state, body), fields(%id, answer_len = body.answer.len()))]
pub async fn http_update_answer(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
  Json(body): Json<AnswerIn>,
) -> Result<Json<SessionView>, ApiError> {
  run(&state, id, Action::UpdateAnswer { answer: body.answer }).await
}

#[instrument(level = "info", skip(state, body), fields(%id, answer_len = body.answer.len()))]
pub async fn http_submit(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
  Json(body): Json<AnswerIn>,
) -> Result<Json<SessionView>, ApiError> {
  let view = run(&state, id, Action::SubmitTest { answer: body.answer }).await?;
  info!(target: "course", session_id = %id, "HTTP test submitted");
  Ok(view)
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_restart(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
  run(&state, id, Action::Restart).await
}

#[instrument(level = "info", skip(state, body), fields(%id))]
pub async fn http_practice(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
  body: Option<Json<TopicIn>>,
) -> Result<Json<SessionView>, ApiError> {
  let topic = body.and_then(|Json(b)| b.topic);
  run(&state, id, Action::NewPractice { topic }).await
}

#[instrument(level = "info", skip(state, body), fields(%id, answer_len = body.answer.len()))]
pub async fn http_choice(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
  Json(body): Json<ChoiceIn>,
) -> Result<Json<ChoiceOut>, ApiError> {
  let session = state.get_session(&id).await.ok_or(LogicError::UnknownSession)?;
  let out = logic::apply(&state, &session, Action::SubmitChoice { player: body.player, answer: body.answer }).await?;
  Ok(Json(ChoiceOut { view: out.view, leaderboard_entry: out.leaderboard_entry }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_leaderboard(State(state): State<Arc<AppState>>) -> Result<Json<LeaderboardOut>, ApiError> {
  let entries = logic::leaderboard(&state).await?;
  Ok(Json(LeaderboardOut { entries }))
}
