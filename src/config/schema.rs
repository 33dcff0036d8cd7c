//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Where to listen and which path upgrades to WebSocket.
    pub listener: ListenerConfig,

    /// Per-connection timing and sizing.
    pub session: SessionConfig,

    /// Middleware applied around the router.
    pub dispatch: DispatchConfig,

    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// HTTP path that accepts WebSocket upgrades.
    pub path: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            path: "/conn".to_string(),
        }
    }
}

/// Session limits. Ping period is derived: nine tenths of the read deadline.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Peer silence tolerated before teardown (ms).
    pub read_deadline_ms: u64,

    /// Bound on a single socket write (ms).
    pub write_deadline_ms: u64,

    /// Largest inbound frame in bytes.
    pub max_message_size: usize,

    /// Outbound queue slots per session.
    pub outbound_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_deadline_ms: 10_000,
            write_deadline_ms: 10_000,
            max_message_size: 10 * 1024,
            outbound_capacity: 1,
        }
    }
}

/// Dispatch chain configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DispatchConfig {
    /// Install failure containment ahead of the router.
    pub recovery: bool,

    /// Send an error response to the client when a failure is contained.
    pub notify_on_failure: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            recovery: true,
            notify_on_failure: false,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
