//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Both transports render a session through the same `SessionView`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{CaseStudyRecord, Completion, Feedback, LeaderboardEntry, MODULE_COUNT};
use crate::session::{CourseSession, PracticeRound};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    GetState,
    StartCourse {
        #[serde(default)]
        topic: Option<String>,
    },
    NextModule,
    UpdateAnswer {
        answer: String,
    },
    SubmitTest {
        answer: String,
    },
    Restart,
    NewPractice {
        #[serde(default)]
        topic: Option<String>,
    },
    SubmitChoice {
        player: String,
        answer: String,
    },
    Leaderboard,
    Topics,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Session {
        #[serde(rename = "sessionId")]
        session_id: Uuid,
        view: SessionView,
    },
    State {
        view: SessionView,
    },
    ChoiceResult {
        view: SessionView,
        #[serde(rename = "leaderboardEntry")]
        leaderboard_entry: Option<LeaderboardEntry>,
    },
    Leaderboard {
        entries: Vec<LeaderboardEntry>,
    },
    Topics {
        topics: Vec<String>,
    },
    Error {
        message: String,
    },
}

/// Everything the front end needs to draw the current step.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub step_index: u8,
    pub step_name: &'static str,
    pub module_count: u8,
    pub topic: String,
    pub case_study: Option<CaseStudyRecord>,
    pub test_question: Option<Completion>,
    pub user_answer: String,
    pub feedback: Option<Feedback>,
    pub practice: Option<PracticeOut>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeOut {
    pub topic: String,
    pub scenario: Completion,
    pub answer: Option<String>,
    pub player: Option<String>,
    pub feedback: Option<Feedback>,
}

/// Snapshot a session into its public view. Generates nothing.
pub fn to_view(s: &CourseSession) -> SessionView {
    SessionView {
        step_index: s.step().index(),
        step_name: s.step().name(),
        module_count: MODULE_COUNT,
        topic: s.topic().to_string(),
        case_study: s.current_case_study().cloned(),
        test_question: s.test_question().cloned(),
        user_answer: s.user_answer().to_string(),
        feedback: s.feedback().cloned(),
        practice: s.practice().map(practice_out),
    }
}

fn practice_out(p: &PracticeRound) -> PracticeOut {
    PracticeOut {
        topic: p.topic.clone(),
        scenario: p.scenario.clone(),
        answer: p.result.as_ref().map(|r| r.answer.clone()),
        player: p.result.as_ref().map(|r| r.player.clone()),
        feedback: p.result.as_ref().map(|r| r.feedback.clone()),
    }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Default, Deserialize)]
pub struct TopicIn {
    #[serde(default)]
    pub topic: Option<String>,
}

#[derive(Deserialize)]
pub struct AnswerIn {
    pub answer: String,
}

#[derive(Deserialize)]
pub struct ChoiceIn {
    pub player: String,
    pub answer: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreatedOut {
    pub session_id: Uuid,
    pub view: SessionView,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceOut {
    pub view: SessionView,
    pub leaderboard_entry: Option<LeaderboardEntry>,
}

#[derive(Serialize)]
pub struct LeaderboardOut {
    pub entries: Vec<LeaderboardEntry>,
}

#[derive(Serialize)]
pub struct TopicsOut {
    pub topics: Vec<String>,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub sessions: usize,
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn welcome_view_is_empty() {
        let v = serde_json::to_value(to_view(&CourseSession::new())).unwrap();
        assert_eq!(v["stepIndex"], 0);
        assert_eq!(v["stepName"], "welcome");
        assert_eq!(v["moduleCount"], 3);
        assert!(v["caseStudy"].is_null());
        assert!(v["feedback"].is_null());
        assert!(v["practice"].is_null());
    }

    #[test]
    fn client_messages_parse_from_tagged_json() {
        let m: ClientWsMessage = serde_json::from_str(r#"{"type":"start_course"}"#).unwrap();
        assert!(matches!(m, ClientWsMessage::StartCourse { topic: None }));
        let m: ClientWsMessage =
            serde_json::from_str(r#"{"type":"submit_choice","player":"Ann","answer":"x"}"#).unwrap();
        assert!(matches!(m, ClientWsMessage::SubmitChoice { .. }));
    }
}
