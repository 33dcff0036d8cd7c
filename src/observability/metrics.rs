//! Metrics collection and exposition.
//!
//! # Metrics
//! - `ws_sessions_active` (gauge): currently registered sessions
//! - `ws_sessions_total` (counter): sessions opened
//! - `ws_session_duration_seconds` (histogram): session lifetime
//! - `ws_messages_total` (counter, labels: code): requests dispatched
//! - `ws_unknown_codes_total` (counter): requests with no handler
//! - `ws_handler_failures_total` (counter, labels: kind): failures contained by recovery
//! - `ws_outbound_dropped_total` (counter, labels: reason): responses never queued
//! - `ws_dispatch_duration_seconds` (histogram): time spent in the handler chain
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - The exporter is optional and off by default

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const SESSIONS_ACTIVE: &str = "ws_sessions_active";
pub const SESSIONS_TOTAL: &str = "ws_sessions_total";
pub const SESSION_DURATION_SECONDS: &str = "ws_session_duration_seconds";
pub const MESSAGES_TOTAL: &str = "ws_messages_total";
pub const UNKNOWN_CODES_TOTAL: &str = "ws_unknown_codes_total";
pub const HANDLER_FAILURES_TOTAL: &str = "ws_handler_failures_total";
pub const OUTBOUND_DROPPED_TOTAL: &str = "ws_outbound_dropped_total";
pub const DISPATCH_DURATION_SECONDS: &str = "ws_dispatch_duration_seconds";

/// Install the global Prometheus recorder and serve it on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn set_active_sessions(count: usize) {
    gauge!(SESSIONS_ACTIVE).set(count as f64);
}

pub fn record_session_opened() {
    counter!(SESSIONS_TOTAL).increment(1);
}

pub fn record_session_closed(lifetime: Duration) {
    histogram!(SESSION_DURATION_SECONDS).record(lifetime.as_secs_f64());
}

pub fn record_message(code: &str) {
    counter!(MESSAGES_TOTAL, "code" => code.to_owned()).increment(1);
}

pub fn record_unknown_code() {
    counter!(UNKNOWN_CODES_TOTAL).increment(1);
}

pub fn record_handler_failure(kind: &'static str) {
    counter!(HANDLER_FAILURES_TOTAL, "kind" => kind).increment(1);
}

pub fn record_outbound_dropped(reason: &'static str) {
    counter!(OUTBOUND_DROPPED_TOTAL, "reason" => reason).increment(1);
}

pub fn record_dispatch_duration(elapsed: Duration) {
    histogram!(DISPATCH_DURATION_SECONDS).record(elapsed.as_secs_f64());
}
