//! Per-session state machine.
//!
//! `Connected --join--> Joined --disconnect--> Left`, with `disconnect` also
//! reachable from `Connected`. Each live session owns one record behind its
//! own mutex; a transition holds that lock across the registry mutation and
//! the broadcast submission, so two events for one session never interleave
//! while different sessions proceed in parallel.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use huddle_core::constants::{
    PRESENCE_JOINED, PRESENCE_JOINS_TOTAL, PRESENCE_LEAVES_TOTAL, PRESENCE_REJECTED_TOTAL,
};
use huddle_core::{InboundEvent, OutboundMessage, PresenceError, Roster, SessionId, SessionState};
use huddle_settings::PresenceSettings;
use metrics::{counter, gauge};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::broadcaster::BroadcastSink;
use crate::registry::Registry;

/// Result of applying one [`InboundEvent`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    /// A record was created in `Connected`.
    Connected,
    /// The session joined; carries the announced roster.
    Joined(Roster),
    /// A chat message was submitted for broadcast.
    Chat(OutboundMessage),
    /// The session left. Carries the announced roster when it had joined.
    Left(Option<Roster>),
}

#[derive(Debug)]
struct SessionRecord {
    state: SessionState,
    nickname: Option<String>,
}

/// Drives session transitions and submits the broadcasts they imply.
pub struct LifecycleManager {
    sessions: DashMap<SessionId, Arc<Mutex<SessionRecord>>>,
    registry: Arc<Registry>,
    broadcast: Arc<dyn BroadcastSink>,
    max_nickname_chars: usize,
    max_message_chars: usize,
}

impl LifecycleManager {
    /// Create a manager over `registry` that submits to `broadcast`.
    pub fn new(
        registry: Arc<Registry>,
        broadcast: Arc<dyn BroadcastSink>,
        settings: &PresenceSettings,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            registry,
            broadcast,
            max_nickname_chars: settings.max_nickname_chars,
            max_message_chars: settings.max_message_chars,
        }
    }

    /// The registry this manager mutates.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Dispatch one inbound event to its transition.
    pub fn apply(
        &self,
        session_id: &SessionId,
        event: InboundEvent,
    ) -> Result<Transition, PresenceError> {
        match event {
            InboundEvent::Connect => self.on_connect(session_id.clone()).map(|()| Transition::Connected),
            InboundEvent::Join { nickname } => self.on_join(session_id, &nickname).map(Transition::Joined),
            InboundEvent::Message { text } => self.on_message(session_id, &text).map(Transition::Chat),
            InboundEvent::Disconnect => Ok(Transition::Left(self.on_disconnect(session_id))),
        }
    }

    /// Create a `Connected` record. No broadcast.
    pub fn on_connect(&self, session_id: SessionId) -> Result<(), PresenceError> {
        match self.sessions.entry(session_id) {
            Entry::Occupied(entry) => {
                let state = entry.get().lock().state;
                Err(rejected(PresenceError::InvalidState {
                    session_id: entry.key().clone(),
                    operation: "connect",
                    state: Some(state),
                }))
            }
            Entry::Vacant(entry) => {
                debug!(session_id = %entry.key(), "session connected");
                let _ = entry.insert(Arc::new(Mutex::new(SessionRecord {
                    state: SessionState::Connected,
                    nickname: None,
                })));
                Ok(())
            }
        }
    }

    /// Join with `nickname` (trimmed) and announce the new roster.
    ///
    /// A second join for the same session is rejected.
    pub fn on_join(&self, session_id: &SessionId, nickname: &str) -> Result<Roster, PresenceError> {
        let record = self.record(session_id, "join")?;
        let mut record = record.lock();
        if !record.state.can_transition_to(SessionState::Joined) {
            return Err(rejected(PresenceError::InvalidState {
                session_id: session_id.clone(),
                operation: "join",
                state: Some(record.state),
            }));
        }

        let nickname = nickname.trim();
        self.validate_nickname(session_id, nickname).map_err(rejected)?;

        let roster = self.registry.join(session_id, nickname);
        record.state = SessionState::Joined;
        record.nickname = Some(nickname.to_owned());
        self.broadcast.broadcast_roster(roster.clone());

        info!(%session_id, nickname, joined = roster.len(), "session joined");
        counter!(PRESENCE_JOINS_TOTAL).increment(1);
        record_joined(&roster);
        Ok(roster)
    }

    /// Submit a chat message from a joined session.
    pub fn on_message(
        &self,
        session_id: &SessionId,
        text: &str,
    ) -> Result<OutboundMessage, PresenceError> {
        let record = self.record(session_id, "message")?;
        let record = record.lock();
        if record.state != SessionState::Joined {
            return Err(rejected(PresenceError::InvalidState {
                session_id: session_id.clone(),
                operation: "message",
                state: Some(record.state),
            }));
        }

        let len = text.chars().count();
        if len > self.max_message_chars {
            return Err(rejected(PresenceError::MessageTooLong {
                session_id: session_id.clone(),
                len,
                limit: self.max_message_chars,
            }));
        }

        let Some(nickname) = self.registry.nickname(session_id) else {
            return Err(rejected(PresenceError::InvalidState {
                session_id: session_id.clone(),
                operation: "message",
                state: Some(record.state),
            }));
        };

        let message = OutboundMessage::new(nickname, text);
        self.broadcast.broadcast_chat(message.clone());
        debug!(%session_id, nickname = message.nickname(), len, "chat message submitted");
        Ok(message)
    }

    /// Move the session to `Left` and drop its record. Idempotent.
    ///
    /// Returns the announced roster when the session had joined. Without a
    /// record the registry is left untouched: only the record holder may
    /// remove a registry entry, so a stale disconnect can never evict a
    /// session that reconnected under the same id.
    pub fn on_disconnect(&self, session_id: &SessionId) -> Option<Roster> {
        let Some((_, record)) = self.sessions.remove(session_id) else {
            debug!(%session_id, "disconnect for unknown session");
            return None;
        };

        // In-flight operations that already cloned the record now see `Left`.
        let mut record = record.lock();
        let prior = record.state;
        if !prior.can_transition_to(SessionState::Left) {
            debug!(%session_id, state = prior.as_str(), "session already left");
            return None;
        }
        record.state = SessionState::Left;
        let roster = self.registry.leave(session_id);

        if prior != SessionState::Joined {
            debug!(%session_id, state = prior.as_str(), "session disconnected before joining");
            return None;
        }

        self.broadcast.broadcast_roster(roster.clone());
        info!(
            %session_id,
            nickname = record.nickname.as_deref().unwrap_or_default(),
            joined = roster.len(),
            "session left"
        );
        counter!(PRESENCE_LEAVES_TOTAL).increment(1);
        record_joined(&roster);
        Some(roster)
    }

    /// Current state of a live session; `None` once it has left.
    pub fn state(&self, session_id: &SessionId) -> Option<SessionState> {
        self.sessions.get(session_id).map(|record| record.lock().state)
    }

    /// Number of live (connected or joined) sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn record(
        &self,
        session_id: &SessionId,
        operation: &'static str,
    ) -> Result<Arc<Mutex<SessionRecord>>, PresenceError> {
        // Clone out of the map so the shard lock is released before locking.
        self.sessions
            .get(session_id)
            .map(|record| Arc::clone(record.value()))
            .ok_or_else(|| {
                rejected(PresenceError::InvalidState {
                    session_id: session_id.clone(),
                    operation,
                    state: None,
                })
            })
    }

    fn validate_nickname(&self, session_id: &SessionId, nickname: &str) -> Result<(), PresenceError> {
        let reason = if nickname.is_empty() {
            "nickname is empty".to_owned()
        } else if nickname.chars().count() > self.max_nickname_chars {
            format!("nickname exceeds {} chars", self.max_nickname_chars)
        } else {
            return Ok(());
        };
        Err(PresenceError::InvalidNickname {
            session_id: session_id.clone(),
            reason,
        })
    }
}

fn rejected(err: PresenceError) -> PresenceError {
    warn!(session_id = %err.session_id(), code = err.code(), error = %err, "event rejected");
    counter!(PRESENCE_REJECTED_TOTAL, "code" => err.code()).increment(1);
    err
}

#[allow(clippy::cast_precision_loss)]
fn record_joined(roster: &Roster) {
    gauge!(PRESENCE_JOINED).set(roster.len() as f64);
}
