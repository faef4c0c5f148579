//! Conversation persistence extension point.
//!
//! Persistence is best-effort: the orchestrator logs a [`StoreError`] and
//! still answers the request. Two backends ship:
//!
//! - [`LogConversationStore`] (default) only writes a structured log line
//! - [`InMemoryConversationStore`] keeps the latest history per user in
//!   process memory, bounded by a session cap
//!
//! [`create_store`] picks one from [`StoreConfig`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::config::{StoreConfig, StoreKind};
use crate::pipeline::{ChatMessage, CoherenceReport};

/// Session key used when a request carries no user id.
pub const ANONYMOUS_SESSION: &str = "anonymous";

/// Failure to record a conversation.
#[derive(Debug, thiserror::Error)]
#[error("conversation store `{store}` failed: {reason}")]
pub struct StoreError {
    pub store: String,
    pub reason: String,
}

impl StoreError {
    pub fn new(store: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self {
            store: store.into(),
            reason: reason.to_string(),
        }
    }
}

/// Durable record of completed conversations.
///
/// Implementations must tolerate being called more than once for the same
/// conversation.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    fn name(&self) -> &str;

    /// Record the full history (including the new assistant reply) and the
    /// coherence report it was produced under.
    async fn persist(
        &self,
        user_id: Option<&str>,
        messages: &[ChatMessage],
        coherence: &CoherenceReport,
    ) -> Result<(), StoreError>;
}

/// Store that records nothing beyond a log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogConversationStore;

#[async_trait]
impl ConversationStore for LogConversationStore {
    fn name(&self) -> &str {
        "log"
    }

    async fn persist(
        &self,
        user_id: Option<&str>,
        messages: &[ChatMessage],
        coherence: &CoherenceReport,
    ) -> Result<(), StoreError> {
        tracing::info!(
            user_id = user_id.unwrap_or("anonymous"),
            messages = messages.len(),
            kappa = coherence.kappa,
            tau = coherence.tau,
            sigma = coherence.sigma,
            notes = %coherence.notes,
            "Saving conversation"
        );
        Ok(())
    }
}

// ── In-memory store ──────────────────────────────────────────────

/// Latest state recorded for one user.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredConversation {
    /// Full history as of the last completed turn, including the reply.
    pub messages: Vec<ChatMessage>,
    pub last_coherence: CoherenceReport,
    /// Completed turns recorded for this session since creation or reset.
    pub turns: u64,
}

struct Session {
    conversation: StoredConversation,
    updated: Instant,
}

/// Per-user conversation store held in process memory.
///
/// Each persist replaces the session's history with the one supplied, since
/// every chat request carries the full conversation. When `max_sessions` is
/// reached, the least recently updated session is evicted.
pub struct InMemoryConversationStore {
    max_sessions: usize,
    sessions: Mutex<HashMap<String, Session>>,
}

impl InMemoryConversationStore {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            max_sessions: max_sessions.max(1),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Snapshot of the session for `user_id` (`None` is the anonymous session).
    pub fn get(&self, user_id: Option<&str>) -> Option<StoredConversation> {
        self.sessions
            .lock()
            .get(session_key(user_id))
            .map(|session| session.conversation.clone())
    }

    /// Drop the session for `user_id`. Returns whether one existed.
    pub fn reset(&self, user_id: Option<&str>) -> bool {
        self.sessions.lock().remove(session_key(user_id)).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn session_key(user_id: Option<&str>) -> &str {
    user_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .unwrap_or(ANONYMOUS_SESSION)
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn persist(
        &self,
        user_id: Option<&str>,
        messages: &[ChatMessage],
        coherence: &CoherenceReport,
    ) -> Result<(), StoreError> {
        let key = session_key(user_id);
        let mut sessions = self.sessions.lock();

        if !sessions.contains_key(key) && sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, session)| session.updated)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                sessions.remove(&oldest);
                tracing::debug!(evicted = %oldest, "Conversation session evicted");
            }
        }

        let turns = sessions
            .get(key)
            .map_or(0, |session| session.conversation.turns)
            + 1;
        sessions.insert(
            key.to_string(),
            Session {
                conversation: StoredConversation {
                    messages: messages.to_vec(),
                    last_coherence: coherence.clone(),
                    turns,
                },
                updated: Instant::now(),
            },
        );
        tracing::debug!(
            session = key,
            messages = messages.len(),
            turns,
            "Conversation stored in memory"
        );
        Ok(())
    }
}

/// Build the conversation store selected by `config`.
pub fn create_store(config: &StoreConfig) -> Arc<dyn ConversationStore> {
    match config.kind {
        StoreKind::Log => Arc::new(LogConversationStore),
        StoreKind::Memory => Arc::new(InMemoryConversationStore::new(config.max_sessions)),
    }
}
