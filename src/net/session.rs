//! Per-connection session state.
//!
//! A [`Session`] is a cheap handle shared by the inbound pump, the outbound
//! pump and any handler that is serving one of its requests. Handlers reply
//! through [`Session::send_response`]; bytes only reach the socket via the
//! outbound pump.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};

use super::hub::Hub;
use crate::config::SessionConfig;
use crate::message::Response;
use crate::observability::metrics;

/// Short opaque connection identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    const LEN: usize = 8;

    /// Fresh random id: the first eight hex digits of a v4 UUID.
    pub fn generate() -> Self {
        let mut id = uuid::Uuid::new_v4().simple().to_string();
        id.truncate(Self::LEN);
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// Timing and sizing limits applied to every session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Maximum silence (no pong) before the peer is considered dead.
    pub read_deadline: Duration,
    /// Upper bound on any single socket write.
    pub write_deadline: Duration,
    /// Keepalive ping interval. Always shorter than `read_deadline`.
    pub ping_period: Duration,
    /// Largest inbound frame accepted, in bytes.
    pub max_message_size: usize,
    /// Outbound queue slots.
    pub outbound_capacity: usize,
}

impl SessionSettings {
    pub fn new(read_deadline: Duration, write_deadline: Duration) -> Self {
        Self {
            read_deadline,
            write_deadline,
            ping_period: ping_period_for(read_deadline),
            ..Self::default()
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        let read_deadline = Duration::from_secs(10);
        Self {
            read_deadline,
            write_deadline: Duration::from_secs(10),
            ping_period: ping_period_for(read_deadline),
            max_message_size: 10 * 1024,
            outbound_capacity: 1,
        }
    }
}

impl From<&SessionConfig> for SessionSettings {
    fn from(config: &SessionConfig) -> Self {
        let read_deadline = Duration::from_millis(config.read_deadline_ms);
        Self {
            read_deadline,
            write_deadline: Duration::from_millis(config.write_deadline_ms),
            ping_period: ping_period_for(read_deadline),
            max_message_size: config.max_message_size,
            outbound_capacity: config.outbound_capacity,
        }
    }
}

/// Pings go out at nine tenths of the read deadline.
fn ping_period_for(read_deadline: Duration) -> Duration {
    read_deadline * 9 / 10
}

/// Receiving end of a session's outbound queue, drained by the write pump.
pub type OutboundQueue = mpsc::Receiver<String>;

struct SessionInner {
    id: SessionId,
    outbound: mpsc::Sender<String>,
    hub: Hub,
    closed: watch::Sender<bool>,
    connected_at: Instant,
}

/// Handle to one live connection.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

/// Non-owning reference held by the hub.
#[derive(Clone)]
pub struct WeakSession(Weak<SessionInner>);

impl WeakSession {
    pub fn upgrade(&self) -> Option<Session> {
        self.0.upgrade().map(|inner| Session { inner })
    }
}

impl Session {
    /// Create a session with a fresh id. It is not registered yet.
    pub fn new(hub: Hub, settings: &SessionSettings) -> (Self, OutboundQueue) {
        let (outbound, queue) = mpsc::channel(settings.outbound_capacity.max(1));
        let (closed, _) = watch::channel(false);
        let session = Self {
            inner: Arc::new(SessionInner {
                id: SessionId::generate(),
                outbound,
                hub,
                closed,
                connected_at: Instant::now(),
            }),
        };
        (session, queue)
    }

    pub fn id(&self) -> &SessionId {
        &self.inner.id
    }

    /// How long this session has existed.
    pub fn age(&self) -> Duration {
        self.inner.connected_at.elapsed()
    }

    pub fn downgrade(&self) -> WeakSession {
        WeakSession(Arc::downgrade(&self.inner))
    }

    /// Serialize a response and queue it for the write pump.
    ///
    /// Waits while the outbound queue is full. Returns `false` if the
    /// response was dropped: it failed to serialize or the session has
    /// been torn down.
    pub async fn send_response(&self, response: &Response) -> bool {
        match response.to_json() {
            Ok(payload) => self.send_text(payload).await,
            Err(e) => {
                tracing::warn!(session_id = %self.id(), code = %response.code, error = %e, "Failed to serialize response");
                metrics::record_outbound_dropped("serialization");
                false
            }
        }
    }

    /// Queue an already encoded text payload.
    pub async fn send_text(&self, payload: String) -> bool {
        let sent = tokio::select! {
            biased;
            _ = self.closed() => false,
            sent = self.inner.outbound.send(payload) => sent.is_ok(),
        };
        if !sent {
            tracing::debug!(session_id = %self.id(), "Session closed, dropping outbound message");
            metrics::record_outbound_dropped("closed");
        }
        sent
    }

    /// Tear the session down: mark it closed and unregister it.
    ///
    /// Safe to call any number of times from either pump.
    pub fn close(&self) {
        let was_closed = self.inner.closed.send_replace(true);
        if !was_closed {
            self.inner.hub.unregister(self.id());
            tracing::debug!(session_id = %self.id(), "Session closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        *self.inner.closed.borrow()
    }

    /// Resolves once [`Session::close`] has been called.
    ///
    /// The flag's read guard never outlives this future, so it is safe to
    /// race against writes in a `select!`.
    pub async fn closed(&self) {
        let mut closed = self.inner.closed.subscribe();
        let _ = closed.wait_for(|closed| *closed).await;
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}
