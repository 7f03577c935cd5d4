//! Application state: completion oracle, prompts, leaderboard and the session registry.
//!
//! Sessions are explicit: created by `create_session`, looked up by id for
//! every action, and removed by `end_session`. Each session sits behind its
//! own mutex, so actions within one session run one at a time while
//! different sessions proceed independently.
//!
//! Clients that never say goodbye are handled by `spawn_idle_sweeper`: a
//! session nobody has looked up for the idle window, and that no connection
//! or request still holds, is dropped.

use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::{
    sync::{Mutex, RwLock},
    task::JoinHandle,
    time::Instant,
};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::completion::CompletionOracle;
use crate::leaderboard::LeaderboardStore;
use crate::prompt::PromptBuilder;
use crate::session::{ContentSource, CourseSession};

pub type SessionHandle = Arc<Mutex<CourseSession>>;

struct SessionEntry {
    handle: SessionHandle,
    last_seen: Instant,
}

pub struct AppState {
    pub oracle: Arc<dyn CompletionOracle>,
    pub prompts: PromptBuilder,
    pub leaderboard: LeaderboardStore,
    sessions: RwLock<HashMap<Uuid, SessionEntry>>,
}

impl AppState {
    pub fn new(
        oracle: Arc<dyn CompletionOracle>,
        prompts: PromptBuilder,
        leaderboard: LeaderboardStore,
    ) -> Self {
        Self {
            oracle,
            prompts,
            leaderboard,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Borrowed oracle + prompts for one session action.
    pub fn content(&self) -> ContentSource<'_> {
        ContentSource::new(self.oracle.as_ref(), &self.prompts)
    }

    /// Register a fresh session at the welcome step.
    #[instrument(level = "info", skip(self))]
    pub async fn create_session(&self) -> (Uuid, SessionHandle) {
        let id = Uuid::new_v4();
        let handle = Arc::new(Mutex::new(CourseSession::new()));
        let active = {
            let mut sessions = self.sessions.write().await;
            sessions.insert(id, SessionEntry { handle: handle.clone(), last_seen: Instant::now() });
            sessions.len()
        };
        info!(target: "course", session_id = %id, active, "Session created");
        (id, handle)
    }

    /// Look up a session and mark it as active.
    #[instrument(level = "debug", skip(self), fields(%id))]
    pub async fn get_session(&self, id: &Uuid) -> Option<SessionHandle> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(id)?;
        entry.last_seen = Instant::now();
        Some(entry.handle.clone())
    }

    /// Drop a session. Returns false if it was already gone.
    #[instrument(level = "info", skip(self), fields(%id))]
    pub async fn end_session(&self, id: &Uuid) -> bool {
        let (removed, active) = {
            let mut sessions = self.sessions.write().await;
            let removed = sessions.remove(id).is_some();
            (removed, sessions.len())
        };
        if removed {
            info!(target: "course", session_id = %id, active, "Session ended");
        }
        removed
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Remove sessions unseen for longer than `max_idle`. A session whose
    /// handle is still held elsewhere (open socket, request in flight) stays.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let (evicted, active) = {
            let mut sessions = self.sessions.write().await;
            let before = sessions.len();
            sessions.retain(|_, e| e.last_seen.elapsed() <= max_idle || Arc::strong_count(&e.handle) > 1);
            (before - sessions.len(), sessions.len())
        };
        if evicted > 0 {
            info!(target: "course", evicted, active, "Idle sessions evicted");
        } else {
            debug!(target: "course", active, "No idle sessions to evict");
        }
        evicted
    }
}

/// Run `evict_idle` every `every` for the life of the process.
pub fn spawn_idle_sweeper(state: Arc<AppState>, max_idle: Duration, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(every);
        loop {
            tick.tick().await;
            state.evict_idle(max_idle).await;
        }
    })
}
