//! Values carried on the two broadcast channels.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical broadcast channel. A transport maps these to its own routes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Full nickname collection after every join or leave.
    Roster,
    /// One chat message per broadcast.
    Chat,
}

impl Channel {
    /// Stable channel name, also used as the outbound frame `type`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Roster => "roster",
            Self::Chat => "chat",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of every joined nickname at one registry revision.
///
/// Nicknames are sorted; duplicates are kept because two sessions may share
/// a nickname.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    /// Registry revision this snapshot was taken at.
    pub revision: u64,
    /// Sorted nicknames of all joined sessions.
    pub nicknames: Vec<String>,
}

impl Roster {
    /// Build a roster, sorting the nicknames.
    pub fn new(revision: u64, mut nicknames: Vec<String>) -> Self {
        nicknames.sort_unstable();
        Self {
            revision,
            nicknames,
        }
    }

    /// Whether `nickname` is present.
    pub fn contains(&self, nickname: &str) -> bool {
        self.nicknames.iter().any(|n| n == nickname)
    }

    /// Number of joined sessions.
    pub fn len(&self) -> usize {
        self.nicknames.len()
    }

    /// Whether nobody is joined.
    pub fn is_empty(&self) -> bool {
        self.nicknames.is_empty()
    }
}

/// One chat broadcast. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    nickname: String,
    message: String,
}

impl OutboundMessage {
    /// Create a chat message from its author's nickname and the text.
    pub fn new(nickname: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            nickname: nickname.into(),
            message: message.into(),
        }
    }

    /// Author nickname.
    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    /// Message text.
    pub fn message(&self) -> &str {
        &self.message
    }
}
