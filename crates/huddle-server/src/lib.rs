//! # huddle-server
//!
//! Axum HTTP + WebSocket transport for the chat relay.
//!
//! - [`server::HuddleServer`]: router, listener and shutdown wiring
//! - [`websocket::hub::ConnectionHub`]: live sockets, implements
//!   [`huddle_core::Transport`] for the broadcaster
//! - [`websocket::session`]: one task per socket, from upgrade to disconnect

#![deny(unsafe_code)]

pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;
