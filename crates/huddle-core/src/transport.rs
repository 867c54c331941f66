//! The seam between the presence core and whatever carries frames.

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::DeliveryError;
use crate::ids::SessionId;
use crate::messages::Channel;

/// Outbound delivery primitive implemented by a concrete transport.
///
/// `send` delivers one already-encoded frame to one session. Implementations
/// must not block indefinitely; the broadcaster bounds every call with a
/// timeout regardless.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver `payload` to `session_id` on `channel`.
    async fn send(
        &self,
        session_id: &SessionId,
        channel: Channel,
        payload: Arc<str>,
    ) -> Result<(), DeliveryError>;
}

/// Inbound application-level event, already deframed by the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundEvent {
    /// Transport connection opened.
    Connect,
    /// Client announced a nickname.
    Join {
        /// Requested nickname.
        nickname: String,
    },
    /// Client posted a chat message.
    Message {
        /// Message body.
        text: String,
    },
    /// Transport connection closed.
    Disconnect,
}

impl InboundEvent {
    /// Operation name used in logs and errors.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Join { .. } => "join",
            Self::Message { .. } => "message",
            Self::Disconnect => "disconnect",
        }
    }
}

impl From<crate::frames::ClientFrame> for InboundEvent {
    fn from(frame: crate::frames::ClientFrame) -> Self {
        match frame {
            crate::frames::ClientFrame::Join { nickname } => Self::Join { nickname },
            crate::frames::ClientFrame::Message { text } => Self::Message { text },
        }
    }
}
