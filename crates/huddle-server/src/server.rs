//! `HuddleServer`: Axum HTTP + WebSocket server.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use huddle_core::{Roster, SessionId, Transport};
use huddle_presence::{Broadcaster, LifecycleManager, Registry};
use huddle_settings::HuddleSettings;
use metrics_exporter_prometheus::PrometheusHandle;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::hub::ConnectionHub;
use crate::websocket::session::{SessionOptions, run_ws_session};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Open sockets.
    pub hub: Arc<ConnectionHub>,
    /// Session state machine.
    pub lifecycle: Arc<LifecycleManager>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Prometheus handle for `/metrics`, if a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
    /// Per-socket options.
    pub session_options: SessionOptions,
    /// Connection cap.
    pub max_connections: usize,
    /// One permit per allowed socket, held for the life of its session.
    pub connection_slots: Arc<Semaphore>,
    /// Largest accepted inbound WebSocket message, in bytes.
    pub max_message_size: usize,
    /// When the server started.
    pub start_time: Instant,
}

/// The chat relay server.
pub struct HuddleServer {
    settings: HuddleSettings,
    hub: Arc<ConnectionHub>,
    lifecycle: Arc<LifecycleManager>,
    shutdown: Arc<ShutdownCoordinator>,
    metrics: Option<PrometheusHandle>,
    connection_slots: Arc<Semaphore>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    start_time: Instant,
}

impl HuddleServer {
    /// Wire the registry, broadcaster, lifecycle manager and hub together.
    ///
    /// Spawns the broadcast dispatcher, so this must run inside a Tokio
    /// runtime.
    pub fn new(settings: HuddleSettings, metrics: Option<PrometheusHandle>) -> Self {
        let shutdown = Arc::new(ShutdownCoordinator::new());
        let registry = Arc::new(Registry::new());
        let hub = Arc::new(ConnectionHub::new(settings.server.send_queue_capacity));

        let (broadcaster, dispatcher) = Broadcaster::spawn(
            Arc::clone(&registry),
            Arc::clone(&hub) as Arc<dyn Transport>,
            settings.presence.send_timeout(),
            shutdown.child_token(),
        );
        let lifecycle = Arc::new(LifecycleManager::new(
            registry,
            Arc::new(broadcaster),
            &settings.presence,
        ));
        let connection_slots = Arc::new(Semaphore::new(
            settings.server.max_connections.min(Semaphore::MAX_PERMITS),
        ));

        Self {
            settings,
            hub,
            lifecycle,
            shutdown,
            metrics,
            connection_slots,
            dispatcher: Mutex::new(Some(dispatcher)),
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            hub: Arc::clone(&self.hub),
            lifecycle: Arc::clone(&self.lifecycle),
            shutdown: Arc::clone(&self.shutdown),
            metrics: self.metrics.clone(),
            session_options: SessionOptions::from_settings(&self.settings),
            max_connections: self.settings.server.max_connections,
            connection_slots: Arc::clone(&self.connection_slots),
            max_message_size: self.settings.server.max_message_size,
            start_time: self.start_time,
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/roster", get(roster_handler))
            .route("/metrics", get(metrics_handler))
            .route("/ws", get(ws_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Port `0` picks a free port; the bound address is returned.
    pub async fn listen(&self) -> io::Result<(SocketAddr, JoinHandle<()>)> {
        let addr = format!("{}:{}", self.settings.server.host, self.settings.server.port);
        let listener = TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;

        let router = self.router();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            let signal = async move { token.cancelled().await };
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(signal)
                .await
            {
                error!(error = %e, "server stopped with error");
            }
        });

        info!(%local_addr, "huddle relay listening");
        Ok((local_addr, handle))
    }

    /// Cancel everything and wait for `handles` plus the broadcast
    /// dispatcher to finish.
    pub async fn graceful_shutdown(&self, mut handles: Vec<JoinHandle<()>>, timeout: Option<Duration>) {
        let dispatcher = self.dispatcher.lock().take();
        if let Some(dispatcher) = dispatcher {
            handles.push(dispatcher);
        }
        self.shutdown.graceful_shutdown(handles, timeout).await;
    }

    /// The loaded settings.
    pub fn settings(&self) -> &HuddleSettings {
        &self.settings
    }

    /// The connection hub.
    pub fn hub(&self) -> &Arc<ConnectionHub> {
        &self.hub
    }

    /// The session lifecycle manager.
    pub fn lifecycle(&self) -> &Arc<LifecycleManager> {
        &self.lifecycle
    }

    /// The shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.hub.count(),
        state.lifecycle.registry().len(),
    ))
}

/// GET /roster
async fn roster_handler(State(state): State<AppState>) -> Json<Roster> {
    Json(state.lifecycle.registry().snapshot())
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            crate::metrics::render(handle),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// GET /ws
async fn ws_handler(
    State(state): State<AppState>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    // The slot is reserved before upgrading and released when the session ends.
    let Ok(slot) = Arc::clone(&state.connection_slots).try_acquire_owned() else {
        warn!(max = state.max_connections, "connection limit reached, refusing upgrade");
        return (StatusCode::SERVICE_UNAVAILABLE, "connection limit reached").into_response();
    };
    let ws = match upgrade {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let session_id = SessionId::new();
    let token = state.shutdown.token();
    ws.max_message_size(state.max_message_size)
        .on_upgrade(move |socket| async move {
            run_ws_session(
                socket,
                session_id,
                state.hub,
                state.lifecycle,
                state.session_options,
                token,
            )
            .await;
            drop(slot);
        })
}
