use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// The addressable conversation with one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

/// What the next free-text message from the user will be consumed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PendingOperation {
    #[default]
    None,
    AwaitingTranslationInput,
}

#[derive(Debug)]
pub struct ConversationState {
    pending: PendingOperation,
    last_seen: DateTime<Utc>,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self {
            pending: PendingOperation::None,
            last_seen: Utc::now(),
        }
    }
}

impl ConversationState {
    pub fn pending(&self) -> PendingOperation {
        self.pending
    }

    /// Overwrites the single slot; operations are never stacked.
    pub fn set_pending(&mut self, pending: PendingOperation) {
        self.pending = pending;
    }

    pub fn last_seen(&self) -> DateTime<Utc> {
        self.last_seen
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_seen = now;
    }
}

pub type SessionHandle = Arc<tokio::sync::Mutex<ConversationState>>;

struct SessionEntry {
    handle: SessionHandle,
    // Written under the map lock, so a session handed out by `session` is
    // never picked by an eviction sweep that runs before its lock is taken.
    last_fetched: DateTime<Utc>,
}

/// Owns one [`ConversationState`] per session.
///
/// Each state sits behind its own async mutex. Whoever handles an event holds
/// that lock until the reply is produced, so one session's events are handled
/// one at a time in the order they queued, while other sessions are untouched.
#[derive(Default)]
pub struct ConversationManager {
    sessions: Mutex<HashMap<SessionId, SessionEntry>>,
}

impl ConversationManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the session's state, creating it on first interaction.
    pub fn session(&self, id: SessionId) -> SessionHandle {
        let now = Utc::now();
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = sessions.entry(id).or_insert_with(|| {
            debug!(session = id.0, "Session started.");
            SessionEntry {
                handle: Arc::new(tokio::sync::Mutex::new(ConversationState::default())),
                last_fetched: now,
            }
        });
        entry.last_fetched = now;
        entry.handle.clone()
    }

    /// Forgets the session; the next event starts from a fresh idle state.
    pub fn end_session(&self, id: SessionId) -> bool {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let ended = sessions.remove(&id).is_some();
        if ended {
            debug!(session = id.0, "Session ended.");
        }
        ended
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Drops sessions that have been neither fetched nor handled an event
    /// within `max_idle`.
    ///
    /// A session whose lock is held is in the middle of an event and is kept.
    /// Returns how many sessions were dropped.
    pub fn evict_idle(&self, now: DateTime<Utc>, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();

        sessions.retain(|id, entry| match entry.handle.try_lock() {
            Ok(state) => {
                let last_active = state.last_seen().max(entry.last_fetched);
                let keep = now.signed_duration_since(last_active) < max_idle;
                if !keep {
                    debug!(session = id.0, "Session ended after being idle.");
                }
                keep
            }
            Err(_) => true,
        });

        before - sessions.len()
    }
}
