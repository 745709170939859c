//! Match sessions and round rules

pub mod combat;
pub mod session;

pub use session::Session;

use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Why a session rejected or skipped a message
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Round outcome already processed")]
    StaleState,

    #[error("Opponent is no longer connected")]
    PeerUnavailable,

    #[error("Connection is not part of this session")]
    NotParticipant,

    #[error("Session has ended")]
    Terminated,
}

/// Registry of all active sessions
pub struct SessionRegistry {
    sessions: DashMap<Uuid, Arc<Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    pub fn insert(&self, session: Arc<Session>) {
        self.sessions.insert(session.id(), session);
    }

    pub fn remove(&self, id: &Uuid) -> Option<Arc<Session>> {
        self.sessions.remove(id).map(|(_, s)| s)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
