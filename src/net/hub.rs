//! Registry of active sessions.
//!
//! # Responsibilities
//! - Track which sessions are currently connected
//! - Linearize register / unregister across all sessions
//! - Answer lookups in the same order as mutations
//! - Close every session when the server shuts down
//!
//! # Design Decisions
//! - A single task owns the map; callers only send commands
//! - Mutations are fire-and-forget: they cannot fail from the caller's view
//! - Entries are weak: the registry never keeps a session alive

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time;

use super::session::{Session, SessionId, WeakSession};
use crate::observability::metrics;

enum HubCommand {
    Register(SessionId, WeakSession),
    Unregister(SessionId),
    Contains {
        id: SessionId,
        reply: oneshot::Sender<bool>,
    },
    Get {
        id: SessionId,
        reply: oneshot::Sender<Option<Session>>,
    },
    Count {
        reply: oneshot::Sender<usize>,
    },
    Ids {
        reply: oneshot::Sender<Vec<SessionId>>,
    },
}

/// Handle to the session registry.
///
/// Cheap to clone; every session holds one. Commands from all handles are
/// applied in arrival order by the [`HubLoop`].
#[derive(Clone, Debug)]
pub struct Hub {
    tx: mpsc::UnboundedSender<HubCommand>,
}

/// The coordinating loop that owns the registry map.
pub struct HubLoop {
    rx: mpsc::UnboundedReceiver<HubCommand>,
    sessions: HashMap<SessionId, WeakSession>,
}

impl Hub {
    /// Create a hub handle and the loop that must be driven for it to work.
    pub fn new() -> (Self, HubLoop) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self { tx },
            HubLoop {
                rx,
                sessions: HashMap::new(),
            },
        )
    }

    /// Create a hub and spawn its loop on the current Tokio runtime.
    pub fn spawn() -> Self {
        let (hub, hub_loop) = Self::new();
        tokio::spawn(hub_loop.run());
        hub
    }

    /// Add a session. Registering the same id again replaces the entry.
    pub fn register(&self, session: &Session) {
        self.command(HubCommand::Register(session.id().clone(), session.downgrade()));
    }

    /// Remove a session by id. No-op when the id is absent.
    pub fn unregister(&self, id: &SessionId) {
        self.command(HubCommand::Unregister(id.clone()));
    }

    pub async fn contains(&self, id: &SessionId) -> bool {
        self.query(|reply| HubCommand::Contains { id: id.clone(), reply })
            .await
            .unwrap_or(false)
    }

    /// Look up a live session by id.
    pub async fn get(&self, id: &SessionId) -> Option<Session> {
        self.query(|reply| HubCommand::Get { id: id.clone(), reply })
            .await
            .flatten()
    }

    /// Number of registered sessions.
    pub async fn len(&self) -> usize {
        self.query(|reply| HubCommand::Count { reply }).await.unwrap_or(0)
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Registered ids, sorted.
    pub async fn session_ids(&self) -> Vec<SessionId> {
        self.query(|reply| HubCommand::Ids { reply }).await.unwrap_or_default()
    }

    /// Close every registered session, then wait up to `grace` for their
    /// pumps to let go of them. Returns how many sessions were closed.
    pub async fn close_all(&self, grace: Duration) -> usize {
        let mut closing = Vec::new();
        for id in self.session_ids().await {
            if let Some(session) = self.get(&id).await {
                closing.push(session.downgrade());
                session.close();
            }
        }

        let drained = time::timeout(grace, async {
            while closing.iter().any(|session| session.upgrade().is_some()) {
                time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        if drained.is_err() {
            tracing::warn!(sessions = closing.len(), grace = ?grace, "Sessions still draining after close");
        }
        closing.len()
    }

    fn command(&self, command: HubCommand) {
        if self.tx.send(command).is_err() {
            tracing::debug!("Hub loop stopped, dropping registry command");
        }
    }

    async fn query<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> HubCommand) -> Option<T> {
        let (reply, rx) = oneshot::channel();
        self.command(build(reply));
        rx.await.ok()
    }
}

impl HubLoop {
    /// Apply commands until every [`Hub`] handle has been dropped.
    pub async fn run(mut self) {
        tracing::debug!("Hub loop started");
        while let Some(command) = self.rx.recv().await {
            self.apply(command);
        }
        tracing::debug!(remaining = self.sessions.len(), "Hub loop stopped");
    }

    fn apply(&mut self, command: HubCommand) {
        match command {
            HubCommand::Register(id, session) => {
                if self.sessions.insert(id.clone(), session).is_some() {
                    tracing::warn!(session_id = %id, "Session registered twice");
                }
                tracing::debug!(session_id = %id, active = self.sessions.len(), "Session registered");
                metrics::set_active_sessions(self.sessions.len());
            }
            HubCommand::Unregister(id) => {
                if self.sessions.remove(&id).is_some() {
                    tracing::debug!(session_id = %id, active = self.sessions.len(), "Session unregistered");
                    metrics::set_active_sessions(self.sessions.len());
                }
            }
            HubCommand::Contains { id, reply } => {
                let _ = reply.send(self.sessions.contains_key(&id));
            }
            HubCommand::Get { id, reply } => {
                let _ = reply.send(self.sessions.get(&id).and_then(WeakSession::upgrade));
            }
            HubCommand::Count { reply } => {
                let _ = reply.send(self.sessions.len());
            }
            HubCommand::Ids { reply } => {
                let mut ids: Vec<SessionId> = self.sessions.keys().cloned().collect();
                ids.sort();
                let _ = reply.send(ids);
            }
        }
    }
}
