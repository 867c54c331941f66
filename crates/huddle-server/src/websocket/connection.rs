//! WebSocket client connection state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use huddle_core::SessionId;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// One connected WebSocket client.
pub struct ClientConnection {
    /// Session this socket carries.
    pub session_id: SessionId,
    /// Send channel to the client's WebSocket write task.
    tx: mpsc::Sender<Arc<str>>,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Whether the client showed any activity since the last heartbeat check.
    is_alive: AtomicBool,
    /// When the last Pong (or any activity) was received.
    last_pong: Mutex<Instant>,
    /// Frames dropped because the queue was full or closed.
    dropped_messages: AtomicU64,
}

impl ClientConnection {
    /// Create a new connection.
    pub fn new(session_id: SessionId, tx: mpsc::Sender<Arc<str>>) -> Self {
        let now = Instant::now();
        Self {
            session_id,
            tx,
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Queue a text frame without waiting.
    ///
    /// A full or closed queue increments the dropped counter and hands the
    /// frame back in the error.
    pub fn send(&self, message: Arc<str>) -> Result<(), TrySendError<Arc<str>>> {
        self.tx.try_send(message).inspect_err(|_| {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
        })
    }

    /// Total frames dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Record client activity.
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Duration since the last activity (or connection establishment).
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Check and reset the alive flag for heartbeat.
    ///
    /// Returns `true` if the client was active since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_connection(capacity: usize) -> (ClientConnection, mpsc::Receiver<Arc<str>>) {
        let (tx, rx) = mpsc::channel(capacity);
        let conn = ClientConnection::new(SessionId::from_raw("sess_1"), tx);
        (conn, rx)
    }

    #[tokio::test]
    async fn send_message_success() {
        let (conn, mut rx) = make_connection(4);
        conn.send(Arc::from("hello")).unwrap();
        assert_eq!(&*rx.recv().await.unwrap(), "hello");
        assert_eq!(conn.drop_count(), 0);
    }

    #[test]
    fn full_queue_counts_drop() {
        let (conn, _rx) = make_connection(1);
        conn.send(Arc::from("first")).unwrap();
        assert!(matches!(conn.send(Arc::from("second")), Err(TrySendError::Full(_))));
        assert_eq!(conn.drop_count(), 1);
    }

    #[test]
    fn closed_queue_counts_drop() {
        let (conn, rx) = make_connection(4);
        drop(rx);
        assert!(matches!(conn.send(Arc::from("x")), Err(TrySendError::Closed(_))));
        assert_eq!(conn.drop_count(), 1);
    }

    #[test]
    fn check_alive_resets_flag() {
        let (conn, _rx) = make_connection(4);
        assert!(conn.check_alive());
        assert!(!conn.check_alive());
        conn.mark_alive();
        assert!(conn.check_alive());
    }

    #[test]
    fn mark_alive_resets_elapsed() {
        let (conn, _rx) = make_connection(4);
        std::thread::sleep(Duration::from_millis(20));
        assert!(conn.last_pong_elapsed() >= Duration::from_millis(20));
        conn.mark_alive();
        assert!(conn.last_pong_elapsed() < Duration::from_millis(20));
        assert!(conn.age() >= Duration::from_millis(20));
    }
}
