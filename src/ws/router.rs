//! Inbound message dispatch

use std::sync::Arc;
use tracing::{debug, warn};

use crate::game::SessionError;
use crate::matchmaking::{ConnectionId, MatchmakingService};
use crate::ws::protocol::{decode, ClientMsg, ProtocolError};

/// Routes decoded client messages to the queue or to the owning session
#[derive(Clone)]
pub struct MessageRouter {
    matchmaking: Arc<MatchmakingService>,
}

impl MessageRouter {
    pub fn new(matchmaking: Arc<MatchmakingService>) -> Self {
        Self { matchmaking }
    }

    /// Handle one text frame from `conn_id`.
    ///
    /// Only undecodable frames are reported; everything else that cannot be
    /// applied is logged and dropped.
    pub async fn route(&self, conn_id: ConnectionId, text: &str) -> Result<(), ProtocolError> {
        let msg = decode(text)?;

        match msg {
            ClientMsg::JoinQueue => {
                if let Err(e) = self.matchmaking.join_queue(conn_id).await {
                    warn!(conn_id = %conn_id, error = %e, "Join request rejected");
                }
            }
            ClientMsg::Unknown => {
                debug!(conn_id = %conn_id, "Ignoring unknown message type");
            }
            msg => {
                if let Err(e) = self.dispatch_to_session(conn_id, msg, text) {
                    debug!(conn_id = %conn_id, error = %e, "Session message dropped");
                }
            }
        }

        Ok(())
    }

    fn dispatch_to_session(
        &self,
        conn_id: ConnectionId,
        msg: ClientMsg,
        raw: &str,
    ) -> Result<(), SessionError> {
        let Some(session) = self.matchmaking.session_of(conn_id) else {
            debug!(conn_id = %conn_id, "Gameplay message before match, ignoring");
            return Ok(());
        };

        let result = match msg {
            ClientMsg::Move => session.relay_move(conn_id, raw),
            ClientMsg::BoardCleared => session.board_cleared(conn_id).map(|_| ()),
            ClientMsg::RoundLost { time } => session.round_lost(conn_id, time).map(|_| ()),
            ClientMsg::JoinQueue | ClientMsg::Unknown => Ok(()),
        };

        if result.is_err() {
            let snapshot = session.snapshot();
            debug!(
                session_id = %session.id(),
                phase = ?snapshot.phase,
                round = snapshot.round,
                "Session rejected message"
            );
        }
        result
    }
}
