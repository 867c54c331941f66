//! WebSocket connection state, the connection hub, and per-socket sessions.

pub mod connection;
pub mod hub;
pub mod session;
