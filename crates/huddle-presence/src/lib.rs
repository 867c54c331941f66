//! # huddle-presence
//!
//! The presence and broadcast coordination layer.
//!
//! - [`Registry`]: authoritative `SessionId → nickname` map of joined sessions
//! - [`LifecycleManager`]: per-session state machine that serializes registry
//!   mutation with broadcast submission
//! - [`Broadcaster`]: asynchronous, ordered fan-out to every joined session
//!   through a [`huddle_core::Transport`]
//!
//! Control flow: transport event → `LifecycleManager` → `Registry` →
//! `BroadcastSink` queue → dispatcher task → `Transport::send` per recipient.

#![deny(unsafe_code)]

pub mod broadcaster;
pub mod lifecycle;
pub mod registry;

pub use broadcaster::{BroadcastSink, Broadcaster};
pub use lifecycle::{LifecycleManager, Transition};
pub use registry::Registry;
