//! Leaderboard persisted as a two-column CSV file (`Player,Score`).
//!
//! The file is read in full and rewritten in full on every update. Rewrites
//! go to a sibling temp file that is then renamed over the original, so a
//! reader never sees a half-written table. Updates from this process are
//! serialized by a mutex; other processes writing the same file are not
//! coordinated and the last rename wins.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::domain::LeaderboardEntry;

const HEADER: &str = "Player,Score";

#[derive(Debug, Error)]
pub enum LeaderboardError {
  #[error("leaderboard io error on {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("malformed leaderboard row {line}: {reason}")]
  Malformed { line: usize, reason: String },
  #[error("invalid player name: {0}")]
  InvalidPlayer(&'static str),
}

pub struct LeaderboardStore {
  path: PathBuf,
  write_lock: Mutex<()>,
}

impl LeaderboardStore {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into(), write_lock: Mutex::new(()) }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Add `delta` to `player`'s score, inserting the player if absent.
  /// Returns the updated row.
  #[instrument(level = "info", target = "leaderboard", skip(self), fields(path = %self.path.display()))]
  pub async fn upsert(&self, player: &str, delta: u32) -> Result<LeaderboardEntry, LeaderboardError> {
    let player = validate_player(player)?;
    let _guard = self.write_lock.lock().await;

    let mut rows = self.read_rows().await?;
    let entry = match rows.iter_mut().find(|r| r.player == player) {
      Some(row) => {
        row.score = row.score.saturating_add(u64::from(delta));
        row.clone()
      }
      None => {
        let row = LeaderboardEntry { player: player.to_string(), score: u64::from(delta) };
        rows.push(row.clone());
        row
      }
    };
    self.write_rows(&rows).await?;
    info!(target: "leaderboard", player = %entry.player, delta, total = entry.score, "Leaderboard updated");
    Ok(entry)
  }

  /// All rows, highest score first; ties ordered by player name.
  #[instrument(level = "debug", target = "leaderboard", skip(self))]
  pub async fn list(&self) -> Result<Vec<LeaderboardEntry>, LeaderboardError> {
    let _guard = self.write_lock.lock().await;
    let mut rows = self.read_rows().await?;
    rows.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.player.cmp(&b.player)));
    Ok(rows)
  }

  async fn read_rows(&self) -> Result<Vec<LeaderboardEntry>, LeaderboardError> {
    match tokio::fs::read_to_string(&self.path).await {
      Ok(s) => parse_table(&s),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        debug!(target: "leaderboard", path = %self.path.display(), "No leaderboard file yet; starting empty");
        Ok(Vec::new())
      }
      Err(source) => Err(LeaderboardError::Io { path: self.path.clone(), source }),
    }
  }

  async fn write_rows(&self, rows: &[LeaderboardEntry]) -> Result<(), LeaderboardError> {
    let io_err = |path: &Path| {
      let path = path.to_path_buf();
      move |source: std::io::Error| LeaderboardError::Io { path, source }
    };

    if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
      tokio::fs::create_dir_all(parent).await.map_err(io_err(parent))?;
    }

    let mut tmp_name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp = self.path.with_file_name(tmp_name);

    tokio::fs::write(&tmp, render_table(rows)).await.map_err(io_err(&tmp))?;
    tokio::fs::rename(&tmp, &self.path).await.map_err(io_err(&self.path))?;
    Ok(())
  }
}

pub fn validate_player(player: &str) -> Result<&str, LeaderboardError> {
  let player = player.trim();
  if player.is_empty() {
    return Err(LeaderboardError::InvalidPlayer("name is blank"));
  }
  if player.chars().any(char::is_control) {
    return Err(LeaderboardError::InvalidPlayer("name contains control characters"));
  }
  Ok(player)
}

/// Parse the whole file. A leading `Player,Score` header is optional; repeated
/// player names are merged by summing their scores.
fn parse_table(s: &str) -> Result<Vec<LeaderboardEntry>, LeaderboardError> {
  let mut rows: Vec<LeaderboardEntry> = Vec::new();
  for (idx, line) in s.lines().enumerate() {
    let line_no = idx + 1;
    if line.trim().is_empty() {
      continue;
    }
    if idx == 0 && line.trim().eq_ignore_ascii_case(HEADER) {
      continue;
    }

    let fields = split_record(line)
      .map_err(|reason| LeaderboardError::Malformed { line: line_no, reason })?;
    let [player, score] = <[String; 2]>::try_from(fields).map_err(|f| LeaderboardError::Malformed {
      line: line_no,
      reason: format!("expected 2 columns, found {}", f.len()),
    })?;
    let score = score.trim().parse::<u64>().map_err(|e| LeaderboardError::Malformed {
      line: line_no,
      reason: format!("score {:?}: {}", score, e),
    })?;

    let player = player.trim().to_string();
    match rows.iter_mut().find(|r| r.player == player) {
      Some(existing) => existing.score = existing.score.saturating_add(score),
      None => rows.push(LeaderboardEntry { player, score }),
    }
  }
  Ok(rows)
}

fn render_table(rows: &[LeaderboardEntry]) -> String {
  let mut out = String::from(HEADER);
  out.push('\n');
  for r in rows {
    out.push_str(&quote_field(&r.player));
    out.push(',');
    out.push_str(&r.score.to_string());
    out.push('\n');
  }
  out
}

fn quote_field(v: &str) -> String {
  if v.contains([',', '"']) {
    format!("\"{}\"", v.replace('"', "\"\""))
  } else {
    v.to_string()
  }
}

/// Split one CSV line into fields, honoring double-quoted fields with `""` escapes.
fn split_record(line: &str) -> Result<Vec<String>, String> {
  let mut fields = Vec::new();
  let mut cur = String::new();
  let mut chars = line.chars().peekable();
  let mut in_quotes = false;

  while let Some(ch) = chars.next() {
    match (in_quotes, ch) {
      (true, '"') if chars.peek() == Some(&'"') => {
        chars.next();
        cur.push('"');
      }
      (true, '"') => in_quotes = false,
      (true, c) => cur.push(c),
      (false, '"') if cur.is_empty() => in_quotes = true,
      (false, ',') => fields.push(std::mem::take(&mut cur)),
      (false, c) => cur.push(c),
    }
  }
  if in_quotes {
    return Err("unterminated quoted field".into());
  }
  fields.push(cur);
  Ok(fields)
}
