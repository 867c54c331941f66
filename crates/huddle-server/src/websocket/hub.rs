//! Registry of live sockets, and the [`Transport`] the broadcaster sends
//! through.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use huddle_core::{Channel, DeliveryError, SessionId, Transport};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::trace;

use super::connection::ClientConnection;

/// All open WebSocket connections, keyed by session.
pub struct ConnectionHub {
    connections: DashMap<SessionId, Arc<ClientConnection>>,
    queue_capacity: usize,
}

impl ConnectionHub {
    /// Create a hub whose per-connection queues hold `queue_capacity` frames.
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            connections: DashMap::new(),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Register a connection for `session_id` and return it with the
    /// receiving end of its outbound queue.
    pub fn register(
        &self,
        session_id: SessionId,
    ) -> (Arc<ClientConnection>, mpsc::Receiver<Arc<str>>) {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let connection = Arc::new(ClientConnection::new(session_id.clone(), tx));
        let _ = self.connections.insert(session_id, Arc::clone(&connection));
        (connection, rx)
    }

    /// Remove a connection.
    pub fn remove(&self, session_id: &SessionId) -> Option<Arc<ClientConnection>> {
        self.connections.remove(session_id).map(|(_, conn)| conn)
    }

    /// Look up a connection.
    pub fn get(&self, session_id: &SessionId) -> Option<Arc<ClientConnection>> {
        self.connections.get(session_id).map(|c| Arc::clone(c.value()))
    }

    /// Number of open connections.
    pub fn count(&self) -> usize {
        self.connections.len()
    }

    /// Queue `payload` for one session without waiting.
    pub fn deliver(&self, session_id: &SessionId, payload: Arc<str>) -> Result<(), DeliveryError> {
        let connection = self
            .get(session_id)
            .ok_or_else(|| DeliveryError::Unreachable(session_id.clone()))?;
        connection.send(payload).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::QueueFull(session_id.clone()),
            TrySendError::Closed(_) => DeliveryError::Closed(session_id.clone()),
        })
    }
}

#[async_trait]
impl Transport for ConnectionHub {
    async fn send(
        &self,
        session_id: &SessionId,
        channel: Channel,
        payload: Arc<str>,
    ) -> Result<(), DeliveryError> {
        trace!(%session_id, %channel, len = payload.len(), "queueing frame");
        self.deliver(session_id, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid(s: &str) -> SessionId {
        SessionId::from_raw(s)
    }

    #[tokio::test]
    async fn send_reaches_registered_connection() {
        let hub = ConnectionHub::new(8);
        let (_conn, mut rx) = hub.register(sid("s1"));
        hub.send(&sid("s1"), Channel::Chat, Arc::from("hi"))
            .await
            .unwrap();
        assert_eq!(&*rx.recv().await.unwrap(), "hi");
    }

    #[tokio::test]
    async fn unknown_session_is_unreachable() {
        let hub = ConnectionHub::new(8);
        let err = hub
            .send(&sid("ghost"), Channel::Roster, Arc::from("{}"))
            .await
            .unwrap_err();
        assert_eq!(err, DeliveryError::Unreachable(sid("ghost")));
    }

    #[test]
    fn full_queue_reports_queue_full() {
        let hub = ConnectionHub::new(1);
        let (conn, _rx) = hub.register(sid("s1"));
        hub.deliver(&sid("s1"), Arc::from("a")).unwrap();
        assert_eq!(
            hub.deliver(&sid("s1"), Arc::from("b")),
            Err(DeliveryError::QueueFull(sid("s1")))
        );
        assert_eq!(conn.drop_count(), 1);
    }

    #[test]
    fn closed_queue_reports_closed() {
        let hub = ConnectionHub::new(4);
        let (_conn, rx) = hub.register(sid("s1"));
        drop(rx);
        assert_eq!(
            hub.deliver(&sid("s1"), Arc::from("a")),
            Err(DeliveryError::Closed(sid("s1")))
        );
    }

    #[test]
    fn register_and_remove() {
        let hub = ConnectionHub::new(4);
        let (_a, _rx_a) = hub.register(sid("a"));
        let (_b, _rx_b) = hub.register(sid("b"));
        assert_eq!(hub.count(), 2);
        assert!(hub.remove(&sid("a")).is_some());
        assert!(hub.remove(&sid("a")).is_none());
        assert!(hub.get(&sid("a")).is_none());
        assert_eq!(hub.count(), 1);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let hub = ConnectionHub::new(0);
        let (_conn, _rx) = hub.register(sid("s1"));
        assert!(hub.deliver(&sid("s1"), Arc::from("a")).is_ok());
    }
}
