use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use super::{ConversationTurn, HistoryStore, MAX_HISTORY_TURNS};

struct Entry {
    turns: VecDeque<ConversationTurn>,
    last_seen: DateTime<Utc>,
}

/// Process-local [`HistoryStore`] with an idle lifetime per session.
///
/// Every access refreshes the session's deadline.  Expired sessions read as
/// empty immediately and are dropped from memory by [`purge_expired`].
///
/// [`purge_expired`]: InMemoryHistoryStore::purge_expired
pub struct InMemoryHistoryStore {
    sessions: Mutex<HashMap<String, Entry>>,
    ttl: chrono::Duration,
    max_turns: usize,
}

impl std::fmt::Debug for InMemoryHistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.sessions.lock().map(|s| s.len()).unwrap_or(0);
        write!(f, "InMemoryHistoryStore({count} sessions)")
    }
}

impl InMemoryHistoryStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(36_500)),
            max_turns: MAX_HISTORY_TURNS,
        }
    }

    /// Remove every session idle for longer than the TTL.  Returns how many
    /// were dropped.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let Ok(mut sessions) = self.sessions.lock() else {
            return 0;
        };
        let before = sessions.len();
        sessions.retain(|_, e| !self.is_expired(e, now));
        before - sessions.len()
    }

    /// Number of live sessions held in memory.
    pub fn len(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    fn is_expired(&self, entry: &Entry, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(entry.last_seen) > self.ttl
    }

    fn get_at(&self, session_id: &str, now: DateTime<Utc>) -> Vec<ConversationTurn> {
        let Ok(mut sessions) = self.sessions.lock() else {
            return Vec::new();
        };
        let expired = match sessions.get(session_id) {
            Some(entry) => self.is_expired(entry, now),
            None => return Vec::new(),
        };
        if expired {
            sessions.remove(session_id);
            return Vec::new();
        }
        let Some(entry) = sessions.get_mut(session_id) else {
            return Vec::new();
        };
        entry.last_seen = now;
        entry.turns.iter().cloned().collect()
    }

    fn append_at(&self, session_id: &str, turn: ConversationTurn, now: DateTime<Utc>) {
        let Ok(mut sessions) = self.sessions.lock() else {
            return;
        };
        let entry = sessions.entry(session_id.to_owned()).or_insert_with(|| Entry {
            turns: VecDeque::with_capacity(self.max_turns),
            last_seen: now,
        });
        if self.is_expired(entry, now) {
            entry.turns.clear();
        }
        entry.turns.push_back(turn);
        while entry.turns.len() > self.max_turns {
            entry.turns.pop_front();
        }
        entry.last_seen = now;
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn get(&self, session_id: &str) -> Vec<ConversationTurn> {
        self.get_at(session_id, Utc::now())
    }

    async fn append(&self, session_id: &str, turn: ConversationTurn) {
        self.append_at(session_id, turn, Utc::now());
    }

    async fn clear(&self, session_id: &str) {
        if let Ok(mut sessions) = self.sessions.lock() {
            if sessions.remove(session_id).is_some() {
                debug!(session_id, "session history cleared");
            }
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
