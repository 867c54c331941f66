//! Settings schema.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root settings object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HuddleSettings {
    /// HTTP / WebSocket server.
    pub server: ServerSettings,
    /// Presence and broadcast behaviour.
    pub presence: PresenceSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

/// Server bind address, connection limits and heartbeat.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Host to bind.
    pub host: String,
    /// Port to bind (`0` to auto-assign).
    pub port: u16,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Frames buffered per connection before deliveries fail.
    pub send_queue_capacity: usize,
    /// Seconds between server Ping frames.
    pub heartbeat_interval_secs: u64,
    /// Seconds without a Pong before the client is dropped.
    pub heartbeat_timeout_secs: u64,
    /// Largest inbound WebSocket message, in bytes.
    pub max_message_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
            max_connections: 1024,
            send_queue_capacity: 256,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
            max_message_size: 64 * 1024,
        }
    }
}

impl ServerSettings {
    /// Ping interval as a `Duration`.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Pong timeout as a `Duration`.
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }
}

/// Limits applied by the lifecycle manager and broadcaster.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceSettings {
    /// Longest accepted nickname, in chars, after trimming.
    pub max_nickname_chars: usize,
    /// Longest accepted chat message, in chars.
    pub max_message_chars: usize,
    /// Per-recipient delivery timeout in milliseconds.
    pub send_timeout_ms: u64,
    /// Send an `error` frame to clients whose events are rejected.
    pub report_errors: bool,
}

impl Default for PresenceSettings {
    fn default() -> Self {
        Self {
            max_nickname_chars: 32,
            max_message_chars: 4096,
            send_timeout_ms: 1000,
            report_errors: false,
        }
    }
}

impl PresenceSettings {
    /// Delivery timeout as a `Duration`.
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable multi-line output.
    Pretty,
}

/// Log level and format. `RUST_LOG` takes precedence over `level`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive (e.g. `"info"` or `"info,huddle_presence=debug"`).
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Json,
        }
    }
}
