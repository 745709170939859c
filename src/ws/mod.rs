//! WebSocket transport, wire protocol, and message routing

pub mod handler;
pub mod protocol;
pub mod router;
