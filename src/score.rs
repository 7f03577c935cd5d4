//! Best-effort score scraping from free-form evaluation text.

use std::sync::LazyLock;

use regex::Regex;

use crate::domain::ScoreOutcome;

static SCORE_MARKER: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"Score:\s*(\d+)").expect("score pattern is valid"));

/// First `Score: <digits>` in `feedback`. No range check is applied.
/// A digit run too large for `u32` counts as no marker.
pub fn extract(feedback: &str) -> ScoreOutcome {
  SCORE_MARKER
    .captures(feedback)
    .and_then(|caps| caps.get(1))
    .and_then(|m| m.as_str().parse::<u32>().ok())
    .map(ScoreOutcome::Found)
    .unwrap_or(ScoreOutcome::NotFound)
}
