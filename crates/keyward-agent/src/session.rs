//! Paired session registry

use keyward_core::Session;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::info;

/// Registry of paired workstations keyed by session id
pub trait SessionRegistry: Send + Sync {
    fn get(&self, id: &str) -> Option<Session>;

    /// Returns whether a session was removed
    fn remove(&self, id: &str) -> bool;
}

/// In-memory session registry
#[derive(Debug, Default)]
pub struct MemorySessionRegistry {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: Session) {
        info!(session_id = %session.id, name = %session.pairing.name, "Paired session");
        self.sessions.write().insert(session.id.clone(), session);
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl SessionRegistry for MemorySessionRegistry {
    fn get(&self, id: &str) -> Option<Session> {
        self.sessions.read().get(id).cloned()
    }

    fn remove(&self, id: &str) -> bool {
        let removed = self.sessions.write().remove(id).is_some();
        if removed {
            info!(session_id = %id, "Removed session");
        }
        removed
    }
}
