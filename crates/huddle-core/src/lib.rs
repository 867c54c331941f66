//! # huddle-core
//!
//! Foundation types shared by every huddle crate.
//!
//! - **Branded IDs**: [`SessionId`] newtype assigned by the transport layer
//! - **Session state**: [`SessionState`] (`Connected` → `Joined` → `Left`)
//! - **Messages**: [`Roster`], [`OutboundMessage`], [`Channel`]
//! - **Wire frames**: [`OutboundFrame`] and [`ClientFrame`] JSON envelopes
//! - **Errors**: [`PresenceError`] and [`DeliveryError`] via `thiserror`
//! - **Transport seam**: the [`Transport`] trait the broadcaster delivers through

#![deny(unsafe_code)]

pub mod constants;
pub mod errors;
pub mod frames;
pub mod ids;
pub mod messages;
pub mod session;
pub mod transport;

pub use errors::{DeliveryError, PresenceError};
pub use frames::{ClientFrame, OutboundFrame};
pub use ids::SessionId;
pub use messages::{Channel, OutboundMessage, Roster};
pub use session::SessionState;
pub use transport::{InboundEvent, Transport};
