//! Error taxonomy for presence handling and delivery.

use thiserror::Error;

use crate::ids::SessionId;
use crate::session::SessionState;

/// An inbound event was rejected. Always recovered locally: the event is
/// dropped and no other session is affected.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PresenceError {
    /// The operation is not permitted in the session's current state.
    /// `state` is `None` when the session has no live record.
    #[error("cannot {operation} session {session_id} in state {}", state_name(.state))]
    InvalidState {
        /// Session the event belonged to.
        session_id: SessionId,
        /// Operation that was attempted.
        operation: &'static str,
        /// State observed when the operation was attempted.
        state: Option<SessionState>,
    },

    /// The requested nickname is empty or too long.
    #[error("invalid nickname for session {session_id}: {reason}")]
    InvalidNickname {
        /// Session that tried to join.
        session_id: SessionId,
        /// Why the nickname was refused.
        reason: String,
    },

    /// The message text exceeds the configured limit.
    #[error("message from session {session_id} is {len} chars, limit is {limit}")]
    MessageTooLong {
        /// Session that sent the message.
        session_id: SessionId,
        /// Length of the rejected text, in chars.
        len: usize,
        /// Configured maximum.
        limit: usize,
    },
}

impl PresenceError {
    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::InvalidNickname { .. } => "INVALID_NICKNAME",
            Self::MessageTooLong { .. } => "MESSAGE_TOO_LONG",
        }
    }

    /// Session the rejected event belonged to.
    pub fn session_id(&self) -> &SessionId {
        match self {
            Self::InvalidState { session_id, .. }
            | Self::InvalidNickname { session_id, .. }
            | Self::MessageTooLong { session_id, .. } => session_id,
        }
    }
}

fn state_name(state: &Option<SessionState>) -> &'static str {
    state.map_or("unknown", SessionState::as_str)
}

/// The transport failed to deliver one frame to one recipient.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// No connection is registered for the session.
    #[error("session {0} is unreachable")]
    Unreachable(SessionId),
    /// The recipient's outbound queue is full.
    #[error("send queue full for session {0}")]
    QueueFull(SessionId),
    /// The recipient's connection is closing.
    #[error("connection closed for session {0}")]
    Closed(SessionId),
    /// The send did not complete within the configured timeout.
    #[error("send to session {0} timed out")]
    Timeout(SessionId),
}

impl DeliveryError {
    /// Short classification string for logging and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unreachable(_) => "unreachable",
            Self::QueueFull(_) => "queue_full",
            Self::Closed(_) => "closed",
            Self::Timeout(_) => "timeout",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_state_display_names_state() {
        let err = PresenceError::InvalidState {
            session_id: SessionId::from_raw("s2"),
            operation: "message",
            state: Some(SessionState::Connected),
        };
        assert_eq!(err.to_string(), "cannot message session s2 in state connected");
        assert_eq!(err.code(), "INVALID_STATE");
        assert_eq!(err.session_id().as_str(), "s2");
    }

    #[test]
    fn invalid_state_without_record_is_unknown() {
        let err = PresenceError::InvalidState {
            session_id: SessionId::from_raw("s9"),
            operation: "join",
            state: None,
        };
        assert!(err.to_string().ends_with("in state unknown"));
    }

    #[test]
    fn message_too_long_display() {
        let err = PresenceError::MessageTooLong {
            session_id: SessionId::from_raw("s1"),
            len: 10,
            limit: 5,
        };
        assert_eq!(err.code(), "MESSAGE_TOO_LONG");
        assert!(err.to_string().contains("limit is 5"));
    }

    #[test]
    fn delivery_error_kinds() {
        let id = SessionId::from_raw("s1");
        assert_eq!(DeliveryError::Unreachable(id.clone()).kind(), "unreachable");
        assert_eq!(DeliveryError::QueueFull(id.clone()).kind(), "queue_full");
        assert_eq!(DeliveryError::Closed(id.clone()).kind(), "closed");
        assert_eq!(DeliveryError::Timeout(id).kind(), "timeout");
    }
}
