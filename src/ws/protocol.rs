//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMsg {
    /// Ask to be paired with the next player in line
    JoinQueue,

    /// Board interaction for the opponent's spectator view.
    /// The payload is opaque; the raw frame is relayed as received.
    Move,

    /// Sender cleared their board first
    BoardCleared,

    /// Sender concedes the round
    RoundLost {
        /// Sender's elapsed time for the round, in milliseconds
        time: f64,
    },

    /// Any other `type` value; ignored for forward compatibility
    #[serde(other)]
    Unknown,
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMsg {
    /// Pairing complete, first round is about to start
    #[serde(rename_all = "camelCase")]
    MatchFound {
        is_player1: bool,
        board_size: u32,
        round: u32,
    },

    /// Opponent won the round; recipient takes damage
    RoundLost { damage: u32 },

    /// Recipient won the round
    RoundWon { damage: u32 },

    /// Recipient conceded; damage derived from the finish-time gap
    ApplyDamage { damage: u32 },

    /// Both players move on to a larger board
    #[serde(rename_all = "camelCase")]
    NextRound { board_size: u32, round: u32 },

    /// The other participant disconnected; the match is over
    OpponentLeft,
}

/// A frame queued on a connection's outbox
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Server-generated event
    Msg(ServerMsg),
    /// Opponent payload relayed verbatim
    Relay(String),
}

impl Outbound {
    /// Encode as the text frame sent over the socket
    pub fn into_text(self) -> Result<String, serde_json::Error> {
        match self {
            Outbound::Msg(msg) => serde_json::to_string(&msg),
            Outbound::Relay(raw) => Ok(raw),
        }
    }
}

impl From<ServerMsg> for Outbound {
    fn from(msg: ServerMsg) -> Self {
        Outbound::Msg(msg)
    }
}

/// Inbound frame that could not be decoded
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Decode a text frame into a client message
pub fn decode(text: &str) -> Result<ClientMsg, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}
