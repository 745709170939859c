//! Matchmaking service - pairs connections and owns their lifecycle

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::game::{Session, SessionRegistry};
use crate::ws::protocol::Outbound;

use super::connection::{ConnectionId, ConnectionRegistry};
use super::queue::{JoinOutcome, MatchQueue};

/// Join request rejected before reaching the queue
#[derive(Debug, thiserror::Error)]
pub enum MatchmakingError {
    #[error("Connection {0} is not registered")]
    UnknownConnection(ConnectionId),

    #[error("Connection {0} is already in a match")]
    AlreadyInSession(ConnectionId),
}

/// Matchmaking service
pub struct MatchmakingService {
    queue: Mutex<MatchQueue>,
    connections: ConnectionRegistry,
    sessions: Arc<SessionRegistry>,
}

impl MatchmakingService {
    pub fn new(sessions: Arc<SessionRegistry>) -> Self {
        Self {
            queue: Mutex::new(MatchQueue::new()),
            connections: ConnectionRegistry::new(),
            sessions,
        }
    }

    /// Register a player connection (called when WebSocket connects)
    pub fn register_player(&self) -> (ConnectionId, mpsc::UnboundedReceiver<Outbound>) {
        let (conn_id, rx) = self.connections.register();
        info!(conn_id = %conn_id, connected = self.connections.len(), "Player connected");
        (conn_id, rx)
    }

    /// Unregister a player (called when WebSocket disconnects).
    ///
    /// Clears the queue slot if this connection holds it and ends its session,
    /// notifying the opponent. Runs entirely under the queue lock: the survivor
    /// is detached before `opponentLeft` goes out, so a `joinQueue` sent in
    /// reply is never judged against the dead session.
    pub async fn unregister_player(&self, conn_id: ConnectionId) {
        let mut queue = self.queue.lock().await;
        if let Some(player) = queue.remove(conn_id) {
            info!(
                conn_id = %conn_id,
                waited_secs = player.queued_at.elapsed().as_secs(),
                "Waiting player left the queue"
            );
        }

        let Some(conn) = self.connections.remove(&conn_id) else {
            return;
        };

        if let Some(session) = conn.session {
            if let Some(opponent) = session.opponent_of(conn_id) {
                self.connections.detach_session(&opponent, session.id());
            }
            session.terminate(conn_id);
            self.sessions.remove(&session.id());
        }
        drop(queue);

        info!(
            conn_id = %conn_id,
            connected_secs = conn.connected_at.elapsed().as_secs(),
            "Player unregistered"
        );
    }

    /// Join the queue, forming a session if someone is already waiting
    pub async fn join_queue(&self, conn_id: ConnectionId) -> Result<JoinOutcome, MatchmakingError> {
        if !self.connections.contains(&conn_id) {
            return Err(MatchmakingError::UnknownConnection(conn_id));
        }

        // Sessions are attached under this lock, so the check below cannot go stale
        let mut queue = self.queue.lock().await;
        if self.connections.session_of(&conn_id).is_some() {
            return Err(MatchmakingError::AlreadyInSession(conn_id));
        }

        let outcome = queue.enqueue_or_match(conn_id);

        match outcome {
            JoinOutcome::Waiting => {
                info!(conn_id = %conn_id, "Player waiting for an opponent");
            }
            JoinOutcome::AlreadyWaiting => {
                debug!(conn_id = %conn_id, "Duplicate join request");
            }
            JoinOutcome::Matched { player1, player2 } => {
                if !self.create_session(player1, player2) {
                    // The waiting connection vanished; the newcomer takes the slot
                    warn!(conn_id = %player1, "Waiting player gone, requeueing newcomer");
                    return Ok(queue.enqueue_or_match(player2));
                }
            }
        }

        Ok(outcome)
    }

    /// Build a session over the pair and announce it.
    /// Runs under the queue lock, so neither side can unregister halfway through.
    fn create_session(&self, player1: ConnectionId, player2: ConnectionId) -> bool {
        let (Some(outbox1), Some(outbox2)) = (
            self.connections.outbox(&player1),
            self.connections.outbox(&player2),
        ) else {
            return false;
        };

        let session_id = Uuid::new_v4();
        let session = Arc::new(Session::new(
            session_id,
            (player1, &outbox1),
            (player2, &outbox2),
        ));

        if !self.connections.attach_session(&player1, session.clone())
            || !self.connections.attach_session(&player2, session.clone())
        {
            self.connections.detach_session(&player1, session_id);
            self.connections.detach_session(&player2, session_id);
            return false;
        }

        self.sessions.insert(session.clone());
        session.start();

        info!(
            session_id = %session_id,
            player1 = %player1,
            player2 = %player2,
            "Match found"
        );
        true
    }

    /// Session the connection is currently playing in
    pub fn session_of(&self, conn_id: ConnectionId) -> Option<Arc<Session>> {
        self.connections.session_of(&conn_id)
    }

    /// Whether someone is holding the slot, waiting for an opponent
    pub async fn player_waiting(&self) -> bool {
        !self.queue.lock().await.is_empty()
    }

    pub fn connected_players(&self) -> usize {
        self.connections.len()
    }
}
