//! Ordered, asynchronous fan-out of roster and chat events.
//!
//! The lifecycle manager submits through [`BroadcastSink`], which only
//! enqueues. A single dispatcher task drains the queue, so every recipient
//! observes broadcasts in submission order, and a stuck recipient can never
//! block a lifecycle transition.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use huddle_core::constants::{
    BROADCASTS_TOTAL, BROADCAST_DELIVERIES_TOTAL, BROADCAST_FAILURES_TOTAL,
    BROADCAST_STALE_ROSTERS_TOTAL,
};
use huddle_core::{Channel, DeliveryError, OutboundFrame, OutboundMessage, Roster, Transport};
use metrics::counter;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::registry::Registry;

/// Where the lifecycle manager submits broadcasts. Implementations must not
/// block: they are called while a session's lock is held.
#[cfg_attr(test, mockall::automock)]
pub trait BroadcastSink: Send + Sync {
    /// Announce the full roster to every joined session.
    fn broadcast_roster(&self, roster: Roster);
    /// Deliver one chat message to every joined session.
    fn broadcast_chat(&self, message: OutboundMessage);
}

#[derive(Debug)]
enum Broadcast {
    Roster(Roster),
    Chat(OutboundMessage),
}

impl Broadcast {
    fn channel(&self) -> Channel {
        match self {
            Self::Roster(_) => Channel::Roster,
            Self::Chat(_) => Channel::Chat,
        }
    }

    fn encode(&self) -> Result<Arc<str>, serde_json::Error> {
        let frame = match self {
            Self::Roster(roster) => OutboundFrame::roster(roster),
            Self::Chat(message) => OutboundFrame::chat(message),
        };
        frame.to_json().map(Arc::from)
    }
}

/// Handle to the dispatcher queue. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Broadcaster {
    tx: mpsc::UnboundedSender<Broadcast>,
}

impl Broadcaster {
    /// Start the dispatcher task.
    ///
    /// Recipients are read from `registry` when each broadcast is dispatched;
    /// every `Transport::send` is bounded by `send_timeout`. The task ends
    /// when `token` is cancelled or every `Broadcaster` clone is dropped.
    pub fn spawn(
        registry: Arc<Registry>,
        transport: Arc<dyn Transport>,
        send_timeout: Duration,
        token: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(rx, registry, transport, send_timeout);
        let handle = tokio::spawn(dispatcher.run(token));
        (Self { tx }, handle)
    }

    /// Whether the dispatcher is still accepting broadcasts.
    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }

    fn submit(&self, broadcast: Broadcast) {
        let channel = broadcast.channel();
        if self.tx.send(broadcast).is_err() {
            warn!(%channel, "broadcast dispatcher stopped, dropping broadcast");
        }
    }
}

impl BroadcastSink for Broadcaster {
    fn broadcast_roster(&self, roster: Roster) {
        self.submit(Broadcast::Roster(roster));
    }

    fn broadcast_chat(&self, message: OutboundMessage) {
        self.submit(Broadcast::Chat(message));
    }
}

/// Outcome of dispatching one broadcast.
#[derive(Debug, Default, PartialEq, Eq)]
struct DispatchReport {
    recipients: usize,
    delivered: usize,
    failed: usize,
}

struct Dispatcher {
    rx: mpsc::UnboundedReceiver<Broadcast>,
    registry: Arc<Registry>,
    transport: Arc<dyn Transport>,
    send_timeout: Duration,
    last_roster_revision: Option<u64>,
}

impl Dispatcher {
    fn new(
        rx: mpsc::UnboundedReceiver<Broadcast>,
        registry: Arc<Registry>,
        transport: Arc<dyn Transport>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            rx,
            registry,
            transport,
            send_timeout,
            last_roster_revision: None,
        }
    }

    async fn run(mut self, token: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => {
                    debug!("broadcast dispatcher cancelled");
                    break;
                }
                next = self.rx.recv() => match next {
                    Some(broadcast) => {
                        let _ = self.dispatch(broadcast).await;
                    }
                    None => {
                        debug!("broadcast queue closed");
                        break;
                    }
                },
            }
        }
    }

    /// Returns `None` when a roster was skipped as superseded.
    async fn dispatch(&mut self, broadcast: Broadcast) -> Option<DispatchReport> {
        // Two sessions can mutate the registry in one order and enqueue in
        // the other; never let a recipient see the roster go backwards.
        if let Broadcast::Roster(roster) = &broadcast {
            if self
                .last_roster_revision
                .is_some_and(|last| roster.revision <= last)
            {
                debug!(revision = roster.revision, "skipping superseded roster");
                counter!(BROADCAST_STALE_ROSTERS_TOTAL).increment(1);
                return None;
            }
            self.last_roster_revision = Some(roster.revision);
        }

        let channel = broadcast.channel();
        let payload = match broadcast.encode() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(%channel, error = %e, "failed to encode broadcast");
                return Some(DispatchReport::default());
            }
        };

        let recipients = self.registry.session_ids();
        let transport = Arc::clone(&self.transport);
        let send_timeout = self.send_timeout;
        let sends = recipients.iter().map(|session_id| {
            let transport = &transport;
            let payload = Arc::clone(&payload);
            async move {
                let result =
                    match tokio::time::timeout(send_timeout, transport.send(session_id, channel, payload))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(DeliveryError::Timeout(session_id.clone())),
                    };
                (session_id, result)
            }
        });

        let mut report = DispatchReport {
            recipients: recipients.len(),
            ..DispatchReport::default()
        };
        for (session_id, result) in join_all(sends).await {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(%session_id, %channel, error = %e, "failed to deliver broadcast");
                    counter!(BROADCAST_FAILURES_TOTAL, "kind" => e.kind()).increment(1);
                }
            }
        }

        counter!(BROADCASTS_TOTAL, "channel" => channel.as_str()).increment(1);
        counter!(BROADCAST_DELIVERIES_TOTAL).increment(report.delivered as u64);
        debug!(
            %channel,
            recipients = report.recipients,
            delivered = report.delivered,
            failed = report.failed,
            "broadcast dispatched"
        );
        Some(report)
    }
}
