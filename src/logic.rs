//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! Every learner action goes through `apply`: lock the session, run the
//! transition, and for scored practice answers add the score to the
//! leaderboard. The result is always a fresh `SessionView`.

use thiserror::Error;
use tracing::{error, info, instrument};

use crate::domain::LeaderboardEntry;
use crate::leaderboard::{validate_player, LeaderboardError};
use crate::protocol::{to_view, SessionView};
use crate::session::ActionError;
use crate::state::{AppState, SessionHandle};

/// Named learner actions.
#[derive(Debug, Clone)]
pub enum Action {
  StartCourse { topic: Option<String> },
  NextModule,
  UpdateAnswer { answer: String },
  SubmitTest { answer: String },
  Restart,
  NewPractice { topic: Option<String> },
  SubmitChoice { player: String, answer: String },
}

impl Action {
  pub fn name(&self) -> &'static str {
    match self {
      Action::StartCourse { .. } => "start_course",
      Action::NextModule => "next_module",
      Action::UpdateAnswer { .. } => "update_answer",
      Action::SubmitTest { .. } => "submit_test",
      Action::Restart => "restart",
      Action::NewPractice { .. } => "new_practice",
      Action::SubmitChoice { .. } => "submit_choice",
    }
  }
}

#[derive(Debug, Error)]
pub enum LogicError {
  #[error("unknown session")]
  UnknownSession,
  #[error(transparent)]
  Action(#[from] ActionError),
  #[error(transparent)]
  Leaderboard(#[from] LeaderboardError),
}

#[derive(Debug)]
pub struct ActionOutcome {
  pub view: SessionView,
  /// Updated leaderboard row after a scored practice answer.
  pub leaderboard_entry: Option<LeaderboardEntry>,
}

/// Current view of a session without running any transition.
pub async fn current_view(session: &SessionHandle) -> SessionView {
  to_view(&*session.lock().await)
}

#[instrument(level = "info", skip(state, session, action), fields(action = action.name()))]
pub async fn apply(state: &AppState, session: &SessionHandle, action: Action) -> Result<ActionOutcome, LogicError> {
  let content = state.content();
  let mut s = session.lock().await;
  let mut leaderboard_entry = None;

  match action {
    Action::StartCourse { topic } => s.start_course(content, topic.as_deref()).await?,
    Action::NextModule => s.next_module(content).await?,
    Action::UpdateAnswer { answer } => s.update_answer(&answer)?,
    Action::SubmitTest { answer } => s.submit_test(content, &answer).await?,
    Action::Restart => s.restart()?,
    Action::NewPractice { topic } => {
      s.new_practice(content, topic.as_deref()).await;
    }
    Action::SubmitChoice { player, answer } => {
      // Reject a bad name before spending an oracle call on the answer.
      let player = validate_player(&player)?.to_string();
      let feedback = s.evaluate_choice(content, &answer).await?;
      let score = feedback.score;
      // The round stays open until the board accepts the score, so a failed write can be retried.
      match state.leaderboard.upsert(&player, score.value()).await {
        Ok(entry) => {
          info!(target: "course", player = %entry.player, ?score, total = entry.score, "Practice score recorded");
          s.record_choice(&player, &answer, feedback)?;
          leaderboard_entry = Some(entry);
        }
        Err(e) => {
          error!(target: "course", %player, error = %e, "Failed to record practice score");
          return Err(e.into());
        }
      }
    }
  }

  Ok(ActionOutcome { view: to_view(&s), leaderboard_entry })
}

pub async fn leaderboard(state: &AppState) -> Result<Vec<LeaderboardEntry>, LogicError> {
  Ok(state.leaderboard.list().await?)
}

pub fn topics() -> Vec<String> {
  crate::domain::TOPICS.iter().map(|t| t.to_string()).collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Arc;

  use crate::domain::{Completion, LeaderboardEntry};
  use crate::leaderboard::LeaderboardStore;
  use crate::prompt::PromptBuilder;
  use crate::session::tests::ScriptedOracle;

  fn state_with(oracle: ScriptedOracle, dir: &tempfile::TempDir) -> AppState {
    AppState::new(
      Arc::new(oracle),
      PromptBuilder::default(),
      LeaderboardStore::new(dir.path().join("board.csv")),
    )
  }

  #[tokio::test]
  async fn full_course_walk_through_actions() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_with(ScriptedOracle::numbered(), &dir);
    let (_, session) = state.create_session().await;

    let out = apply(&state, &session, Action::StartCourse { topic: None }).await.unwrap();
    assert_eq!(out.view.step_index, 1);
    assert!(out.view.case_study.is_some());
    for expected in [2u8, 3, 4] {
      let out = apply(&state, &session, Action::NextModule).await.unwrap();
      assert_eq!(out.view.step_index, expected);
    }
    let out = apply(&state, &session, Action::SubmitTest { answer: "Plan".into() }).await.unwrap();
    assert_eq!(out.view.step_name, "feedback");
    assert_eq!(out.view.feedback.as_ref().unwrap().score.value(), 7);
    assert!(out.leaderboard_entry.is_none());

    let out = apply(&state, &session, Action::Restart).await.unwrap();
    assert_eq!(out.view.step_index, 0);
  }

  #[tokio::test]
  async fn invalid_transition_surfaces_as_action_error() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_with(ScriptedOracle::numbered(), &dir);
    let (_, session) = state.create_session().await;
    let err = apply(&state, &session, Action::Restart).await.unwrap_err();
    assert!(matches!(err, LogicError::Action(ActionError::InvalidTransition { .. })));
  }

  #[tokio::test]
  async fn scored_choice_lands_on_leaderboard() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_with(ScriptedOracle::numbered(), &dir);
    let (_, session) = state.create_session().await;

    apply(&state, &session, Action::NewPractice { topic: None }).await.unwrap();
    let out = apply(&state, &session, Action::SubmitChoice { player: "Alice".into(), answer: "x".into() })
      .await
      .unwrap();
    assert_eq!(out.leaderboard_entry, Some(LeaderboardEntry { player: "Alice".into(), score: 7 }));

    apply(&state, &session, Action::NewPractice { topic: None }).await.unwrap();
    apply(&state, &session, Action::SubmitChoice { player: "Alice".into(), answer: "y".into() })
      .await
      .unwrap();
    assert_eq!(
      leaderboard(&state).await.unwrap(),
      vec![LeaderboardEntry { player: "Alice".into(), score: 14 }]
    );
  }

  #[tokio::test]
  async fn missing_marker_adds_zero_but_records_player() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_with(ScriptedOracle::new(|_, _| Completion::Generated("Fine.".into())), &dir);
    let (_, session) = state.create_session().await;
    apply(&state, &session, Action::NewPractice { topic: None }).await.unwrap();
    let out = apply(&state, &session, Action::SubmitChoice { player: "Bo".into(), answer: "x".into() })
      .await
      .unwrap();
    assert_eq!(out.leaderboard_entry.unwrap().score, 0);
  }

  #[tokio::test]
  async fn blank_player_is_rejected_before_evaluation() {
    let dir = tempfile::tempdir().unwrap();
    let oracle = Arc::new(ScriptedOracle::numbered());
    let state = AppState::new(
      oracle.clone(),
      PromptBuilder::default(),
      LeaderboardStore::new(dir.path().join("board.csv")),
    );
    let (_, session) = state.create_session().await;
    apply(&state, &session, Action::NewPractice { topic: None }).await.unwrap();
    let err = apply(&state, &session, Action::SubmitChoice { player: " ".into(), answer: "x".into() })
      .await
      .unwrap_err();
    assert!(matches!(err, LogicError::Leaderboard(LeaderboardError::InvalidPlayer(_))));
    assert_eq!(oracle.calls(), 1);
  }

  #[tokio::test]
  async fn failed_board_write_keeps_the_round_open_for_retry() {
    let dir = tempfile::tempdir().unwrap();
    let board = dir.path().join("board.csv");
    std::fs::write(&board, "Player,Score\nFrank,lots\n").unwrap();
    let state = state_with(ScriptedOracle::numbered(), &dir);
    let (_, session) = state.create_session().await;
    apply(&state, &session, Action::NewPractice { topic: None }).await.unwrap();

    let err = apply(&state, &session, Action::SubmitChoice { player: "Dana".into(), answer: "x".into() })
      .await
      .unwrap_err();
    assert!(matches!(err, LogicError::Leaderboard(LeaderboardError::Malformed { line: 2, .. })));
    let view = current_view(&session).await;
    assert!(view.practice.unwrap().feedback.is_none());

    std::fs::write(&board, "Player,Score\nFrank,3\n").unwrap();
    let out = apply(&state, &session, Action::SubmitChoice { player: "Dana".into(), answer: "x".into() })
      .await
      .unwrap();
    assert_eq!(out.leaderboard_entry, Some(LeaderboardEntry { player: "Dana".into(), score: 7 }));
    assert!(out.view.practice.unwrap().feedback.is_some());
    assert_eq!(
      leaderboard(&state).await.unwrap(),
      vec![
        LeaderboardEntry { player: "Dana".into(), score: 7 },
        LeaderboardEntry { player: "Frank".into(), score: 3 },
      ]
    );
  }

  #[test]
  fn topics_start_with_default() {
    assert_eq!(topics()[0], crate::domain::DEFAULT_TOPIC);
  }
}
