//! JSON wire frames exchanged with clients.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::errors::PresenceError;
use crate::ids::SessionId;
use crate::messages::{Channel, OutboundMessage, Roster};

/// Frame type sent once after the WebSocket upgrade.
pub const CONNECTION_ESTABLISHED: &str = "connection.established";
/// Frame type sent to a client whose event was rejected (opt-in).
pub const ERROR: &str = "error";

/// Server → client envelope.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundFrame {
    /// Frame type (`roster`, `chat`, `connection.established`, `error`).
    #[serde(rename = "type")]
    pub event_type: String,
    /// RFC 3339 timestamp of frame construction.
    pub timestamp: String,
    /// Type-specific payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl OutboundFrame {
    fn new(event_type: &str, data: serde_json::Value) -> Self {
        Self {
            event_type: event_type.to_owned(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            data: Some(data),
        }
    }

    /// Roster update frame.
    pub fn roster(roster: &Roster) -> Self {
        Self::new(Channel::Roster.as_str(), json!(roster))
    }

    /// Chat frame carrying `{nickname, message}`.
    pub fn chat(message: &OutboundMessage) -> Self {
        Self::new(Channel::Chat.as_str(), json!(message))
    }

    /// Greeting that tells the client its transport-assigned session id.
    pub fn connection_established(session_id: &SessionId) -> Self {
        Self::new(CONNECTION_ESTABLISHED, json!({ "sessionId": session_id }))
    }

    /// Rejection notice for the offending client.
    pub fn error(err: &PresenceError) -> Self {
        Self::new(ERROR, json!({ "code": err.code(), "message": err.to_string() }))
    }

    /// Serialize to the JSON text sent on the wire.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Client → server frame, already deframed from the socket.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Announce a nickname.
    Join {
        /// Display name to publish.
        nickname: String,
    },
    /// Post a chat message.
    Message {
        /// Message body.
        #[serde(alias = "message")]
        text: String,
    },
}

impl ClientFrame {
    /// Parse one inbound text frame.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
