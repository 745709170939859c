//! Live connection registry

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::game::Session;
use crate::ws::protocol::Outbound;

/// Registry key for a live socket
pub type ConnectionId = Uuid;

/// Sending half of a connection's outbound queue, drained by its writer task
pub type Outbox = mpsc::UnboundedSender<Outbound>;

/// Per-connection record
pub struct PlayerConnection {
    pub outbox: Outbox,
    /// Session this connection is playing in, if matched
    pub session: Option<Arc<Session>>,
    pub connected_at: Instant,
}

/// All connected players, keyed by connection id.
/// Holds the only strong handle to each outbox; removing an entry makes the
/// connection unreachable from any session.
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, PlayerConnection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Register a new connection, returning its id and the outbox receiver
    pub fn register(&self) -> (ConnectionId, mpsc::UnboundedReceiver<Outbound>) {
        let id = Uuid::new_v4();
        let (outbox, rx) = mpsc::unbounded_channel();
        self.connections.insert(
            id,
            PlayerConnection {
                outbox,
                session: None,
                connected_at: Instant::now(),
            },
        );
        (id, rx)
    }

    pub fn remove(&self, id: &ConnectionId) -> Option<PlayerConnection> {
        self.connections.remove(id).map(|(_, c)| c)
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.contains_key(id)
    }

    pub fn outbox(&self, id: &ConnectionId) -> Option<Outbox> {
        self.connections.get(id).map(|c| c.outbox.clone())
    }

    pub fn session_of(&self, id: &ConnectionId) -> Option<Arc<Session>> {
        self.connections.get(id).and_then(|c| c.session.clone())
    }

    /// Attach a session. Returns false if the connection is gone.
    pub fn attach_session(&self, id: &ConnectionId, session: Arc<Session>) -> bool {
        match self.connections.get_mut(id) {
            Some(mut conn) => {
                conn.session = Some(session);
                true
            }
            None => false,
        }
    }

    /// Detach the session only if it is still the one identified by `session_id`
    pub fn detach_session(&self, id: &ConnectionId, session_id: Uuid) {
        if let Some(mut conn) = self.connections.get_mut(id) {
            if conn.session.as_ref().map(|s| s.id()) == Some(session_id) {
                conn.session = None;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removing_a_connection_closes_its_outbox() {
        let registry = ConnectionRegistry::new();
        let (id, mut rx) = registry.register();
        assert!(registry.contains(&id));
        assert_eq!(registry.len(), 1);

        let weak = registry.outbox(&id).map(|o| o.downgrade());
        assert!(registry.remove(&id).is_some());

        assert!(weak.and_then(|w| w.upgrade()).is_none());
        assert!(rx.try_recv().is_err());
        assert!(!registry.contains(&id));
    }

    #[test]
    fn detach_ignores_other_sessions() {
        let registry = ConnectionRegistry::new();
        let (a, _rx_a) = registry.register();
        let (b, _rx_b) = registry.register();
        let (outbox_a, outbox_b) = (registry.outbox(&a).unwrap(), registry.outbox(&b).unwrap());
        let session = Arc::new(Session::new(Uuid::new_v4(), (a, &outbox_a), (b, &outbox_b)));

        assert!(registry.attach_session(&a, session.clone()));
        registry.detach_session(&a, Uuid::new_v4());
        assert!(registry.session_of(&a).is_some());

        registry.detach_session(&a, session.id());
        assert!(registry.session_of(&a).is_none());
        assert!(!registry.attach_session(&Uuid::new_v4(), session));
    }
}
