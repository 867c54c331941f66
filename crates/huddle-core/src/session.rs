//! Per-connection lifecycle state.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of one session.
///
/// Transitions only move forward: `Connected → Joined → Left`, with
/// `Connected → Left` for clients that disconnect before joining.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Transport connection open, no nickname announced yet.
    Connected,
    /// Nickname published; the session is in the registry.
    Joined,
    /// Terminal. The session has been purged from the registry.
    Left,
}

impl SessionState {
    /// Stable lowercase name used in logs and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Joined => "joined",
            Self::Left => "left",
        }
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Connected, Self::Joined) | (Self::Connected | Self::Joined, Self::Left)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
