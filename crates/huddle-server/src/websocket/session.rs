//! WebSocket session lifecycle: handles a single connected client from
//! upgrade through disconnect.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use huddle_core::constants::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_MALFORMED_FRAMES_TOTAL};
use huddle_core::{ClientFrame, InboundEvent, OutboundFrame, SessionId};
use huddle_presence::LifecycleManager;
use huddle_settings::HuddleSettings;
use metrics::{counter, gauge};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::ClientConnection;
use super::hub::ConnectionHub;

/// Per-socket behavior taken from settings.
#[derive(Clone, Copy, Debug)]
pub struct SessionOptions {
    /// Interval between server-initiated Ping frames.
    pub heartbeat_interval: Duration,
    /// Silence after which the client is disconnected.
    pub heartbeat_timeout: Duration,
    /// Send an `error` frame when an inbound event is rejected.
    pub report_errors: bool,
}

impl SessionOptions {
    /// Extract session options from loaded settings.
    pub fn from_settings(settings: &HuddleSettings) -> Self {
        Self {
            heartbeat_interval: settings.server.heartbeat_interval(),
            heartbeat_timeout: settings.server.heartbeat_timeout(),
            report_errors: settings.presence.report_errors,
        }
    }
}

/// Run a WebSocket session for a connected client.
///
/// 1. Registers the socket with the hub and opens the session
/// 2. Sends `connection.established` with the session id
/// 3. Applies inbound `join`/`message` frames to the lifecycle manager
/// 4. Forwards queued frames and sends periodic Pings from a writer task
/// 5. On close, leaves the roster before dropping the socket from the hub
#[instrument(skip_all, fields(session_id = %session_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    session_id: SessionId,
    hub: Arc<ConnectionHub>,
    lifecycle: Arc<LifecycleManager>,
    options: SessionOptions,
    shutdown: CancellationToken,
) {
    let (ws_tx, mut ws_rx) = ws.split();
    let (connection, send_rx) = hub.register(session_id.clone());

    if let Err(e) = lifecycle.on_connect(session_id.clone()) {
        warn!(error = %e, "failed to open session");
        let _ = hub.remove(&session_id);
        return;
    }

    let started = Instant::now();
    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    enqueue(&connection, &OutboundFrame::connection_established(&session_id));

    let mut outbound = tokio::spawn(write_loop(ws_tx, send_rx, Arc::clone(&connection), options));

    loop {
        let next = tokio::select! {
            () = shutdown.cancelled() => {
                debug!("server shutting down, closing session");
                break;
            }
            _ = &mut outbound => {
                debug!("writer stopped, closing session");
                break;
            }
            next = ws_rx.next() => next,
        };
        let Some(Ok(msg)) = next else { break };
        connection.mark_alive();

        match msg {
            Message::Text(text) => {
                handle_frame(text.as_str(), &session_id, &lifecycle, &connection, options);
            }
            Message::Binary(data) => match std::str::from_utf8(&data) {
                Ok(text) => handle_frame(text, &session_id, &lifecycle, &connection, options),
                Err(_) => {
                    counter!(WS_MALFORMED_FRAMES_TOTAL).increment(1);
                    debug!(len = data.len(), "dropping non-UTF8 binary frame");
                }
            },
            Message::Close(_) => {
                debug!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    // Leave first so the announcing roster is computed without this session.
    let _ = lifecycle.on_disconnect(&session_id);
    let _ = hub.remove(&session_id);
    outbound.abort();

    info!(
        duration_secs = started.elapsed().as_secs_f64(),
        dropped = connection.drop_count(),
        "client disconnected"
    );
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Forward queued frames to the socket and keep the heartbeat.
async fn write_loop(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut send_rx: mpsc::Receiver<Arc<str>>,
    connection: Arc<ClientConnection>,
    options: SessionOptions,
) {
    let mut ping_interval = tokio::time::interval(options.heartbeat_interval);
    // Skip the immediate first tick
    let _ = ping_interval.tick().await;

    loop {
        tokio::select! {
            msg = send_rx.recv() => {
                let Some(text) = msg else { break };
                if ws_tx.send(Message::Text(text.to_string().into())).await.is_err() {
                    break;
                }
            }
            _ = ping_interval.tick() => {
                if !connection.check_alive()
                    && connection.last_pong_elapsed() > options.heartbeat_timeout
                {
                    warn!(timeout = ?options.heartbeat_timeout, "client unresponsive, disconnecting");
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
                if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }
}

fn handle_frame(
    raw: &str,
    session_id: &SessionId,
    lifecycle: &LifecycleManager,
    connection: &ClientConnection,
    options: SessionOptions,
) {
    let frame = match ClientFrame::parse(raw) {
        Ok(frame) => frame,
        Err(e) => {
            counter!(WS_MALFORMED_FRAMES_TOTAL).increment(1);
            warn!(error = %e, len = raw.len(), "dropping malformed frame");
            return;
        }
    };

    let event = InboundEvent::from(frame);
    let operation = event.operation();
    match lifecycle.apply(session_id, event) {
        Ok(_) => debug!(operation, "event applied"),
        Err(err) if options.report_errors => enqueue(connection, &OutboundFrame::error(&err)),
        Err(_) => {}
    }
}

fn enqueue(connection: &ClientConnection, frame: &OutboundFrame) {
    match frame.to_json() {
        Ok(json) => {
            if connection.send(Arc::from(json)).is_err() {
                warn!(frame_type = %frame.event_type, "failed to enqueue frame (queue full or closed)");
            }
        }
        Err(e) => warn!(frame_type = %frame.event_type, error = %e, "failed to serialize frame"),
    }
}
