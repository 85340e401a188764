//! Per-session conversation history.
//!
//! [`HistoryStore`] is the interface handlers use; it is keyed by the opaque
//! session token issued in the session cookie (see
//! [`crate::middleware::session`]).  The default implementation is
//! [`memory::InMemoryHistoryStore`].

pub mod memory;

use async_trait::async_trait;

pub use memory::InMemoryHistoryStore;

/// Number of turns kept per session; older turns are evicted first.
pub const MAX_HISTORY_TURNS: usize = 16;

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Capitalized name used when rendering the turn into a prompt.
    pub fn label(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// Session-scoped conversation storage.
///
/// Unknown or expired sessions behave as empty histories; none of the
/// operations can fail from the caller's point of view.
#[async_trait]
pub trait HistoryStore: Send + Sync + 'static {
    /// Turns recorded for the session, oldest first.
    async fn get(&self, session_id: &str) -> Vec<ConversationTurn>;

    /// Record a turn, evicting the oldest ones beyond [`MAX_HISTORY_TURNS`].
    async fn append(&self, session_id: &str, turn: ConversationTurn);

    /// Forget every turn of the session.
    async fn clear(&self, session_id: &str);
}
