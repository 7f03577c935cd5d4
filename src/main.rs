//! Manager Upliftment Course · Backend
//!
//! - Axum HTTP + WebSocket API driving a guided restaurant-management course
//! - Completion oracle over an OpenAI-compatible chat endpoint (Gemini by default)
//! - Leaderboard persisted to a CSV file
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   GOOGLE_API_KEY          : required; startup stops without it
//!   COMPLETION_BASE_URL     : default "https://generativelanguage.googleapis.com/v1beta/openai"
//!   COMPLETION_MODEL        : default "gemini-1.5-pro"
//!   COMPLETION_TIMEOUT_SECS : default 60
//!   LEADERBOARD_PATH        : default "leaderboard.csv"
//!   SESSION_IDLE_SECS       : drop sessions unseen this long (default 1800)
//!   PROMPTS_CONFIG_PATH     : optional TOML file overriding prompt templates
//!   PORT                    : u16 (default 3000)
//!   LOG_LEVEL               : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT              : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod config;
mod prompt;
mod completion;
mod score;
mod session;
mod leaderboard;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::completion::CompletionClient;
use crate::config::Settings;
use crate::leaderboard::LeaderboardStore;
use crate::prompt::PromptBuilder;
use crate::routes::build_router;
use crate::state::{spawn_idle_sweeper, AppState};

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let settings = match Settings::from_env() {
    Ok(s) => s,
    Err(e) => {
      error!(target: "manager_course", error = %e, "Configuration error; refusing to start");
      eprintln!("⚠️ {e}");
      std::process::exit(1);
    }
  };

  let client = CompletionClient::new(&settings.oracle)?;
  info!(target: "manager_course", base_url = %client.base_url, model = %client.model, "Completion oracle configured");

  let leaderboard = LeaderboardStore::new(&settings.leaderboard_path);
  info!(target: "manager_course", path = %leaderboard.path().display(), "Leaderboard store ready");

  let state = Arc::new(AppState::new(
    Arc::new(client),
    PromptBuilder::new(settings.prompts.clone()),
    leaderboard,
  ));

  let sweep_every = settings.session_idle.min(SESSION_SWEEP_INTERVAL);
  spawn_idle_sweeper(state.clone(), settings.session_idle, sweep_every);
  info!(target: "manager_course", idle_secs = settings.session_idle.as_secs(), "Idle session sweeper started");

  let app = build_router(state);

  let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
  let listener = TcpListener::bind(addr).await?;
  info!(target: "manager_course", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    error!(target: "manager_course", error = %e, "Failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  info!(target: "manager_course", "Shutdown signal received");
}
