//! Matchmaking: connection registry, waiting slot, and pairing

pub mod connection;
pub mod queue;
pub mod service;

pub use connection::ConnectionId;
pub use service::MatchmakingService;
