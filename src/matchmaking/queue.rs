//! Single-slot matchmaking queue

use std::time::Instant;

use super::connection::ConnectionId;

/// Connection waiting for an opponent
#[derive(Debug, Clone)]
pub struct QueuedPlayer {
    pub conn_id: ConnectionId,
    pub queued_at: Instant,
}

impl QueuedPlayer {
    pub fn new(conn_id: ConnectionId) -> Self {
        Self {
            conn_id,
            queued_at: Instant::now(),
        }
    }
}

/// What a join request led to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Nobody was waiting; the caller now holds the slot
    Waiting,
    /// The caller already holds the slot
    AlreadyWaiting,
    /// Paired with the player that was waiting
    Matched {
        player1: ConnectionId,
        player2: ConnectionId,
    },
}

/// Holds at most one unmatched connection.
/// Pairing is strict FIFO: each arrival is matched with the one before it.
#[derive(Debug, Default)]
pub struct MatchQueue {
    waiting: Option<QueuedPlayer>,
}

impl MatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait in the slot, or pair with whoever is already there
    pub fn enqueue_or_match(&mut self, conn_id: ConnectionId) -> JoinOutcome {
        match self.waiting.take() {
            None => {
                self.waiting = Some(QueuedPlayer::new(conn_id));
                JoinOutcome::Waiting
            }
            Some(waiting) if waiting.conn_id == conn_id => {
                self.waiting = Some(waiting);
                JoinOutcome::AlreadyWaiting
            }
            Some(waiting) => JoinOutcome::Matched {
                player1: waiting.conn_id,
                player2: conn_id,
            },
        }
    }

    /// Clear the slot, but only if it still holds `conn_id`
    pub fn remove(&mut self, conn_id: ConnectionId) -> Option<QueuedPlayer> {
        if self.contains(&conn_id) {
            self.waiting.take()
        } else {
            None
        }
    }

    pub fn contains(&self, conn_id: &ConnectionId) -> bool {
        self.waiting.as_ref().is_some_and(|p| &p.conn_id == conn_id)
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_none()
    }
}
