//! Prompt rendering for every oracle call the course makes.
//!
//! `PromptBuilder` is a pure renderer over `Prompts`: it substitutes values
//! into the named template and never fails. Blank topics fall back to the
//! default course topic, blank scenario/question/answer text to a short
//! placeholder so the model still receives a well-formed prompt.

use crate::config::Prompts;
use crate::domain::DEFAULT_TOPIC;
use crate::util::{fill_template, non_blank_or};

const NO_SCENARIO: &str = "(no scenario was provided)";
const NO_ANSWER: &str = "(the learner did not write an answer)";
const NO_PRIOR_FEEDBACK: &str = "None yet.";

#[derive(Clone, Debug, Default)]
pub struct PromptBuilder {
  prompts: Prompts,
}

impl PromptBuilder {
  pub fn new(prompts: Prompts) -> Self {
    Self { prompts }
  }

  pub fn case_study(&self, topic: &str) -> String {
    fill_template(&self.prompts.case_study, &[("topic", non_blank_or(topic, DEFAULT_TOPIC))])
  }

  pub fn hint(&self, scenario: &str) -> String {
    fill_template(&self.prompts.hint, &[("scenario", non_blank_or(scenario, NO_SCENARIO))])
  }

  pub fn guidance(&self, scenario: &str) -> String {
    fill_template(&self.prompts.guidance, &[("scenario", non_blank_or(scenario, NO_SCENARIO))])
  }

  pub fn test_question(&self, topic: &str) -> String {
    fill_template(&self.prompts.test_question, &[("topic", non_blank_or(topic, DEFAULT_TOPIC))])
  }

  pub fn evaluation(&self, question: &str, answer: &str) -> String {
    fill_template(
      &self.prompts.evaluation,
      &[
        ("question", non_blank_or(question, NO_SCENARIO)),
        ("answer", non_blank_or(answer, NO_ANSWER)),
      ],
    )
  }

  pub fn practice_scenario(&self, topic: &str) -> String {
    fill_template(
      &self.prompts.practice_scenario,
      &[("topic", non_blank_or(topic, DEFAULT_TOPIC))],
    )
  }

  pub fn practice_evaluation(&self, scenario: &str, answer: &str, prior_feedback: Option<&str>) -> String {
    fill_template(
      &self.prompts.practice_evaluation,
      &[
        ("scenario", non_blank_or(scenario, NO_SCENARIO)),
        ("answer", non_blank_or(answer, NO_ANSWER)),
        ("prior_feedback", non_blank_or(prior_feedback.unwrap_or(""), NO_PRIOR_FEEDBACK)),
      ],
    )
  }
}
