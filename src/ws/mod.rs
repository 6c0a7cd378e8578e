//! WebSocket transport: wire protocol, upgrade handler and per-connection sessions

pub mod handler;
pub mod protocol;
pub mod session;
