//! Metric names shared across crates.

/// Successful joins (counter).
pub const PRESENCE_JOINS_TOTAL: &str = "presence_joins_total";
/// Leaves of joined sessions (counter).
pub const PRESENCE_LEAVES_TOTAL: &str = "presence_leaves_total";
/// Inbound events rejected with a presence error (counter, labels: code).
pub const PRESENCE_REJECTED_TOTAL: &str = "presence_rejected_total";
/// Joined sessions (gauge).
pub const PRESENCE_JOINED: &str = "presence_joined";
/// Broadcasts dispatched (counter, labels: channel).
pub const BROADCASTS_TOTAL: &str = "broadcasts_total";
/// Per-recipient deliveries that succeeded (counter).
pub const BROADCAST_DELIVERIES_TOTAL: &str = "broadcast_deliveries_total";
/// Per-recipient deliveries that failed (counter, labels: kind).
pub const BROADCAST_FAILURES_TOTAL: &str = "broadcast_failures_total";
/// Roster snapshots dropped because a newer one was already delivered (counter).
pub const BROADCAST_STALE_ROSTERS_TOTAL: &str = "broadcast_stale_rosters_total";
/// WebSocket connections opened (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// Open WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Inbound frames that failed to parse (counter).
pub const WS_MALFORMED_FRAMES_TOTAL: &str = "ws_malformed_frames_total";
