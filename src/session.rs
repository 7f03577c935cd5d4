//! Per-session course progression.
//!
//! A `CourseSession` walks `Welcome -> Module(1..=3) -> Test -> Feedback` on
//! explicit learner actions, with `Feedback -> Welcome` (restart) as the only
//! way back. Content is generated on entry to a step and cached for the rest
//! of the walk: one case study per module, one test question, one
//! evaluation. Generation never blocks a transition; a failed call simply
//! leaves fallback text in the cache.
//!
//! Separately from the course, a session can run practice rounds: one
//! generated situation, one scored answer per round.

use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::completion::CompletionOracle;
use crate::domain::{CaseStudyRecord, Completion, Feedback, ScoreOutcome, Step, DEFAULT_TOPIC};
use crate::prompt::PromptBuilder;
use crate::score;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionError {
  #[error("'{action}' is not available at step {step}")]
  InvalidTransition { action: &'static str, step: Step },
  #[error("no practice round is open; start one first")]
  NoOpenPracticeRound,
}

/// Oracle plus prompt templates, borrowed for the duration of one action.
#[derive(Clone, Copy)]
pub struct ContentSource<'a> {
  pub oracle: &'a dyn CompletionOracle,
  pub prompts: &'a PromptBuilder,
}

impl<'a> ContentSource<'a> {
  pub fn new(oracle: &'a dyn CompletionOracle, prompts: &'a PromptBuilder) -> Self {
    Self { oracle, prompts }
  }

  /// Scenario first, then hint and guidance derived from that scenario.
  #[instrument(level = "debug", target = "course", skip(self, topic))]
  async fn case_study(&self, module: u8, topic: &str) -> CaseStudyRecord {
    let scenario = self.oracle.complete(&self.prompts.case_study(topic)).await;
    let hint = self.oracle.complete(&self.prompts.hint(scenario.text())).await;
    let guidance = self.oracle.complete(&self.prompts.guidance(scenario.text())).await;
    CaseStudyRecord { module, scenario, hint, guidance }
  }

  async fn evaluate(&self, prompt: String) -> Feedback {
    let text = self.oracle.complete(&prompt).await;
    // Fallback text can still contain digits from an error body; only real output is scored.
    let score = if text.is_fallback() {
      ScoreOutcome::NotFound
    } else {
      score::extract(text.text())
    };
    Feedback { text, score }
  }
}

/// Answer submitted for a practice round and its evaluation.
#[derive(Clone, Debug)]
pub struct PracticeResult {
  pub player: String,
  pub answer: String,
  pub feedback: Feedback,
}

#[derive(Clone, Debug)]
pub struct PracticeRound {
  pub topic: String,
  pub scenario: Completion,
  pub result: Option<PracticeResult>,
}

#[derive(Clone, Debug)]
pub struct CourseSession {
  step: Step,
  topic: String,
  case_studies: Vec<CaseStudyRecord>,
  test_question: Option<Completion>,
  user_answer: String,
  feedback: Option<Feedback>,
  practice: Option<PracticeRound>,
  prior_practice_feedback: Option<String>,
}

impl Default for CourseSession {
  fn default() -> Self {
    Self::new()
  }
}

impl CourseSession {
  pub fn new() -> Self {
    Self {
      step: Step::Welcome,
      topic: DEFAULT_TOPIC.to_string(),
      case_studies: Vec::new(),
      test_question: None,
      user_answer: String::new(),
      feedback: None,
      practice: None,
      prior_practice_feedback: None,
    }
  }

  pub fn step(&self) -> Step { self.step }
  pub fn topic(&self) -> &str { &self.topic }
  pub fn case_studies(&self) -> &[CaseStudyRecord] { &self.case_studies }
  pub fn test_question(&self) -> Option<&Completion> { self.test_question.as_ref() }
  pub fn user_answer(&self) -> &str { &self.user_answer }
  pub fn feedback(&self) -> Option<&Feedback> { self.feedback.as_ref() }
  pub fn practice(&self) -> Option<&PracticeRound> { self.practice.as_ref() }

  /// Case study for the current step, if the session is in a module.
  pub fn current_case_study(&self) -> Option<&CaseStudyRecord> {
    match self.step {
      Step::Module(n) => self.case_studies.get(usize::from(n) - 1),
      _ => None,
    }
  }

  /// Welcome -> Module(1). A blank topic keeps the default one.
  #[instrument(level = "info", target = "course", skip(self, content, topic), fields(step = %self.step))]
  pub async fn start_course(&mut self, content: ContentSource<'_>, topic: Option<&str>) -> Result<(), ActionError> {
    if self.step != Step::Welcome {
      return Err(ActionError::InvalidTransition { action: "start_course", step: self.step });
    }
    if let Some(t) = topic.map(str::trim).filter(|t| !t.is_empty()) {
      self.topic = t.to_string();
    }
    self.enter(content, Step::Module(1)).await;
    Ok(())
  }

  /// Module(n) -> Module(n + 1), or the last module -> Test.
  #[instrument(level = "info", target = "course", skip(self, content), fields(step = %self.step))]
  pub async fn next_module(&mut self, content: ContentSource<'_>) -> Result<(), ActionError> {
    let next = match self.step {
      Step::Module(_) => self.step.next(),
      _ => None,
    };
    let Some(next) = next else {
      return Err(ActionError::InvalidTransition { action: "next_module", step: self.step });
    };
    self.enter(content, next).await;
    Ok(())
  }

  /// Keep the learner's draft answer while they are on the test page.
  pub fn update_answer(&mut self, draft: &str) -> Result<(), ActionError> {
    if self.step != Step::Test {
      return Err(ActionError::InvalidTransition { action: "update_answer", step: self.step });
    }
    self.user_answer = draft.to_string();
    Ok(())
  }

  /// Test -> Feedback. Freezes the answer and runs the single evaluation.
  #[instrument(level = "info", target = "course", skip(self, content, answer), fields(step = %self.step, answer_len = answer.len()))]
  pub async fn submit_test(&mut self, content: ContentSource<'_>, answer: &str) -> Result<(), ActionError> {
    if self.step != Step::Test {
      return Err(ActionError::InvalidTransition { action: "submit_test", step: self.step });
    }
    self.user_answer = answer.to_string();
    self.enter(content, Step::Feedback).await;
    Ok(())
  }

  /// Feedback -> Welcome, dropping every cached course artifact.
  #[instrument(level = "info", target = "course", skip(self), fields(step = %self.step))]
  pub fn restart(&mut self) -> Result<(), ActionError> {
    if self.step != Step::Feedback {
      return Err(ActionError::InvalidTransition { action: "restart", step: self.step });
    }
    self.step = Step::Welcome;
    self.topic = DEFAULT_TOPIC.to_string();
    self.case_studies.clear();
    self.test_question = None;
    self.user_answer.clear();
    self.feedback = None;
    info!(target: "course", "Course restarted");
    Ok(())
  }

  /// Open a new practice round with a freshly generated situation.
  #[instrument(level = "info", target = "course", skip(self, content, topic))]
  pub async fn new_practice(&mut self, content: ContentSource<'_>, topic: Option<&str>) -> &PracticeRound {
    if let Some(done) = self.practice.take().and_then(|r| r.result) {
      self.prior_practice_feedback = Some(done.feedback.text.text().to_string());
    }
    let topic = topic.map(str::trim).filter(|t| !t.is_empty()).unwrap_or(DEFAULT_TOPIC).to_string();
    let scenario = content.oracle.complete(&content.prompts.practice_scenario(&topic)).await;
    self.practice.insert(PracticeRound { topic, scenario, result: None })
  }

  /// Evaluate an answer to the open practice round without closing it. The
  /// previous round's feedback, if any, is passed to the evaluator.
  #[instrument(level = "info", target = "course", skip(self, content, answer), fields(answer_len = answer.len()))]
  pub async fn evaluate_choice(&self, content: ContentSource<'_>, answer: &str) -> Result<Feedback, ActionError> {
    let round = self.practice.as_ref().filter(|r| r.result.is_none()).ok_or(ActionError::NoOpenPracticeRound)?;
    let prompt = content.prompts.practice_evaluation(
      round.scenario.text(),
      answer,
      self.prior_practice_feedback.as_deref(),
    );
    let feedback = content.evaluate(prompt).await;
    debug!(target: "course", score = ?feedback.score, fallback = feedback.text.is_fallback(), "Practice answer evaluated");
    Ok(feedback)
  }

  /// Close the open practice round with an evaluated answer.
  pub fn record_choice(&mut self, player: &str, answer: &str, feedback: Feedback) -> Result<&PracticeResult, ActionError> {
    let round = self.practice.as_mut().filter(|r| r.result.is_none()).ok_or(ActionError::NoOpenPracticeRound)?;
    Ok(round.result.insert(PracticeResult {
      player: player.trim().to_string(),
      answer: answer.to_string(),
      feedback,
    }))
  }

  async fn enter(&mut self, content: ContentSource<'_>, step: Step) {
    self.step = step;
    match step {
      Step::Welcome => {}
      Step::Module(n) => {
        if self.case_studies.len() < usize::from(n) {
          let record = content.case_study(n, &self.topic).await;
          self.case_studies.push(record);
          debug!(target: "course", module = n, "Case study generated");
        } else {
          debug!(target: "course", module = n, "Case study replayed from cache");
        }
      }
      Step::Test => {
        if self.test_question.is_none() {
          self.test_question = Some(content.oracle.complete(&content.prompts.test_question(&self.topic)).await);
        }
      }
      Step::Feedback => {
        if self.feedback.is_none() {
          let question = self.test_question.as_ref().map(Completion::text).unwrap_or_default();
          let prompt = content.prompts.evaluation(question, &self.user_answer);
          let feedback = content.evaluate(prompt).await;
          info!(target: "course", score = ?feedback.score, fallback = feedback.text.is_fallback(), "Test evaluated");
          self.feedback = Some(feedback);
        }
      }
    }
  }
}
