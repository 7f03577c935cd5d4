//! Startup configuration: environment settings plus overridable prompt templates.
//!
//! `Settings::from_env` is the only place the process reads its environment.
//! Prompt templates default to the built-in course wording and can be replaced
//! by a TOML file (see `PromptConfig`).

use std::{path::PathBuf, time::Duration};

use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const DEFAULT_MODEL: &str = "gemini-1.5-pro";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_SESSION_IDLE_SECS: u64 = 30 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("API key is missing. Set GOOGLE_API_KEY in the server environment (or your secret store) and restart.")]
  MissingApiKey,
  #[error("invalid value for {name}: {value:?}")]
  InvalidValue { name: &'static str, value: String },
}

/// Connection details for the completion oracle.
#[derive(Clone, Debug)]
pub struct OracleSettings {
  pub api_key: String,
  pub base_url: String,
  pub model: String,
  pub timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct Settings {
  pub port: u16,
  pub oracle: OracleSettings,
  pub leaderboard_path: PathBuf,
  /// Sessions unseen for this long are dropped from the registry.
  pub session_idle: Duration,
  pub prompts: Prompts,
}

impl Settings {
  /// Read settings from the process environment.
  pub fn from_env() -> Result<Self, ConfigError> {
    Self::from_lookup(|name| std::env::var(name).ok())
  }

  /// Same as `from_env`, with the variable source injected.
  pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
  where
    F: Fn(&str) -> Option<String>,
  {
    let api_key = lookup("GOOGLE_API_KEY")
      .map(|k| k.trim().to_string())
      .filter(|k| !k.is_empty())
      .ok_or(ConfigError::MissingApiKey)?;

    let base_url = lookup("COMPLETION_BASE_URL")
      .map(|u| u.trim_end_matches('/').to_string())
      .unwrap_or_else(|| DEFAULT_BASE_URL.into());
    let model = lookup("COMPLETION_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into());

    let timeout_secs = match lookup("COMPLETION_TIMEOUT_SECS") {
      Some(v) => v.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue {
        name: "COMPLETION_TIMEOUT_SECS",
        value: v.clone(),
      })?,
      None => DEFAULT_TIMEOUT_SECS,
    };

    let port = match lookup("PORT") {
      Some(v) => v
        .trim()
        .parse::<u16>()
        .map_err(|_| ConfigError::InvalidValue { name: "PORT", value: v.clone() })?,
      None => DEFAULT_PORT,
    };

    let session_idle_secs = match lookup("SESSION_IDLE_SECS") {
      Some(v) => v
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|secs| *secs > 0)
        .ok_or(ConfigError::InvalidValue { name: "SESSION_IDLE_SECS", value: v.clone() })?,
      None => DEFAULT_SESSION_IDLE_SECS,
    };

    let leaderboard_path = lookup("LEADERBOARD_PATH")
      .map(PathBuf::from)
      .unwrap_or_else(|| PathBuf::from("leaderboard.csv"));

    let prompts = lookup("PROMPTS_CONFIG_PATH")
      .and_then(|path| load_prompt_config(&path))
      .map(|cfg| cfg.prompts)
      .unwrap_or_default();

    Ok(Self {
      port,
      oracle: OracleSettings {
        api_key,
        base_url,
        model,
        timeout: Duration::from_secs(timeout_secs),
      },
      leaderboard_path,
      session_idle: Duration::from_secs(session_idle_secs),
      prompts,
    })
  }
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PromptConfig {
  #[serde(default)]
  pub prompts: Prompts,
}

/// Prompt templates. Placeholders are `{topic}`, `{scenario}`, `{question}`,
/// `{answer}` and `{prior_feedback}`; unknown placeholders are left as-is.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub case_study: String,
  pub hint: String,
  pub guidance: String,
  pub test_question: String,
  pub evaluation: String,
  pub practice_scenario: String,
  pub practice_evaluation: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      case_study: "Create a realistic and complex restaurant management scenario involving {topic} for training purposes.".into(),
      hint: "Provide a brief and practical hint to handle the following restaurant management case study:\n\n{scenario}".into(),
      guidance: "Scenario: {scenario}\nGive a structured manager-level solution including:\n- Key decisions to consider\n- Strategic actions\n- Best practices\n- What to avoid".into(),
      test_question: "Generate a test case scenario for restaurant managers with a clear challenge about {topic}. Ask the user how they would respond.".into(),
      evaluation: "Test Scenario: {question}\nUser's Response: {answer}\n\nAs a restaurant management expert, evaluate their answer. Provide:\n- Evaluation summary\n- Strengths in their response\n- Areas for improvement\n- Final performance feedback\n- Score out of 10, on its own line, written exactly as 'Score: <number>'".into(),
      practice_scenario: "Describe a short, realistic restaurant management situation about {topic} that needs a decision from the manager. End by asking what the manager should do.".into(),
      practice_evaluation: "Situation: {scenario}\nManager's decision: {answer}\nFeedback from their previous round: {prior_feedback}\n\nAs a restaurant management expert, give brief feedback on the decision and mention any progress since the previous round. Finish with a line written exactly as 'Score: <number>' where the number is from 0 to 10.".into(),
    }
  }
}

/// Load `PromptConfig` from a TOML file. Read or parse errors are logged and yield None.
pub fn load_prompt_config(path: &str) -> Option<PromptConfig> {
  match std::fs::read_to_string(path) {
    Ok(s) => match toml::from_str::<PromptConfig>(&s) {
      Ok(cfg) => {
        info!(target: "manager_course", %path, "Loaded prompt config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "manager_course", %path, error = %e, "Failed to parse TOML prompt config");
        None
      }
    },
    Err(e) => {
      error!(target: "manager_course", %path, error = %e, "Failed to read TOML prompt config");
      None
    }
  }
}
