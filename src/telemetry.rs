//! Tracing setup for the course server.
//!
//! - LOG_LEVEL holds filter directives (e.g. "debug" or
//!   "info,course=debug,leaderboard=debug,tower_http=info").
//! - LOG_FORMAT picks "pretty" (default) or "json".
//!
//! Targets used across the crate: `manager_course` (server lifecycle),
//! `course` (session actions), `oracle` (completion calls) and
//! `leaderboard` (file store).

use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVES: &str =
    "info,course=debug,oracle=info,leaderboard=debug,manager_course=debug,tower_http=info,axum=info";

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    // The json and pretty builders are different types, so init in each arm.
    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => builder.json().init(),
        _ => builder.init(),
    }
}
