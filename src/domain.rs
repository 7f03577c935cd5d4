//! Domain models: course steps, generated content, scores and leaderboard rows.

use serde::{Deserialize, Serialize};

/// Number of case-study modules between the welcome page and the final test.
pub const MODULE_COUNT: u8 = 3;

/// Topic used when the learner does not pick one.
pub const DEFAULT_TOPIC: &str = "staffing, inventory, and customer satisfaction";

/// Built-in topic catalogue offered to the front end.
pub const TOPICS: &[&str] = &[
  DEFAULT_TOPIC,
  "staff scheduling and turnover",
  "inventory control and food cost",
  "customer complaints and service recovery",
  "food safety and hygiene",
  "budgeting and labor cost",
  "conflict between front and back of house",
];

/// Position of a session in the course.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
  Welcome,
  /// Case-study module, 1-based.
  Module(u8),
  Test,
  Feedback,
}

impl Step {
  pub fn index(self) -> u8 {
    match self {
      Step::Welcome => 0,
      Step::Module(n) => n,
      Step::Test => MODULE_COUNT + 1,
      Step::Feedback => MODULE_COUNT + 2,
    }
  }

  pub fn name(self) -> &'static str {
    match self {
      Step::Welcome => "welcome",
      Step::Module(_) => "module",
      Step::Test => "test",
      Step::Feedback => "feedback",
    }
  }

  /// Forward edge taken by "next": welcome -> module 1 -> ... -> test.
  /// Test and Feedback have no "next" edge.
  pub fn next(self) -> Option<Step> {
    match self {
      Step::Welcome => Some(Step::Module(1)),
      Step::Module(n) if n < MODULE_COUNT => Some(Step::Module(n + 1)),
      Step::Module(_) => Some(Step::Test),
      Step::Test | Step::Feedback => None,
    }
  }
}

impl std::fmt::Display for Step {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Step::Module(n) => write!(f, "module({n})"),
      other => f.write_str(other.name()),
    }
  }
}

/// Text produced by the completion oracle, tagged with whether it is real
/// model output or the degraded placeholder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Completion {
  Generated(String),
  Fallback(String),
}

impl Completion {
  /// Renderable text, real or placeholder.
  pub fn text(&self) -> &str {
    match self {
      Completion::Generated(t) | Completion::Fallback(t) => t,
    }
  }

  pub fn is_fallback(&self) -> bool {
    matches!(self, Completion::Fallback(_))
  }
}

/// Result of scanning feedback for a `Score: <n>` marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ScoreOutcome {
  Found(u32),
  NotFound,
}

impl ScoreOutcome {
  /// Integer score with a missing marker read as 0.
  pub fn value(self) -> u32 {
    match self {
      ScoreOutcome::Found(n) => n,
      ScoreOutcome::NotFound => 0,
    }
  }
}

/// Scenario, hint and guidance generated once for a course module.
#[derive(Clone, Debug, Serialize)]
pub struct CaseStudyRecord {
  pub module: u8,
  pub scenario: Completion,
  pub hint: Completion,
  pub guidance: Completion,
}

/// Evaluation of a submitted answer.
#[derive(Clone, Debug, Serialize)]
pub struct Feedback {
  pub text: Completion,
  pub score: ScoreOutcome,
}

/// One leaderboard row: unique player name and cumulative score.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
  pub player: String,
  pub score: u64,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn next_walks_modules_then_stops_at_test() {
    let mut step = Step::Welcome;
    let mut seen = vec![step.index()];
    while let Some(n) = step.next() {
      step = n;
      seen.push(step.index());
    }
    assert_eq!(step, Step::Test);
    assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    assert_eq!(Step::Feedback.index(), 5);
  }

  #[test]
  fn completion_serializes_with_kind_tag() {
    let v = serde_json::to_value(Completion::Fallback("oops".into())).unwrap();
    assert_eq!(v, serde_json::json!({ "kind": "fallback", "text": "oops" }));
  }

  #[test]
  fn missing_score_reads_as_zero() {
    assert_eq!(ScoreOutcome::NotFound.value(), 0);
    assert_eq!(ScoreOutcome::Found(0).value(), 0);
    assert_ne!(ScoreOutcome::NotFound, ScoreOutcome::Found(0));
  }
}
