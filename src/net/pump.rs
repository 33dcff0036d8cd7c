//! Inbound and outbound pumps.
//!
//! Each session runs exactly one of each. The inbound pump decodes frames
//! and dispatches them one at a time; the outbound pump owns every socket
//! write. Whichever stops first tears the session down, which stops the
//! other.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use thiserror::Error;
use tokio::time::{self, Instant};

use super::hub::Hub;
use super::session::{OutboundQueue, Session, SessionSettings};
use crate::message::Request;
use crate::middleware::catch_panic;
use crate::observability::metrics;
use crate::routing::{Handler, HandlerError};

/// Why the inbound pump stopped.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("no keepalive acknowledgment within {0:?}")]
    DeadlineExceeded(Duration),

    #[error("frame of {size} bytes exceeds the {limit} byte limit")]
    MessageTooLarge { size: usize, limit: usize },

    #[error("malformed request: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("peer closed the connection")]
    PeerClosed,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("session torn down")]
    TornDown,

    #[error("handler failed: {0}")]
    Handler(#[from] HandlerError),
}

impl ReadError {
    /// Normal endings that do not deserve a warning.
    pub fn is_graceful(&self) -> bool {
        matches!(self, Self::PeerClosed | Self::TornDown)
    }
}

/// Why the outbound pump stopped early.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("write did not complete within {0:?}")]
    DeadlineExceeded(Duration),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Drive an upgraded WebSocket until the session ends.
pub async fn serve(socket: WebSocket, hub: Hub, handler: Arc<dyn Handler>, settings: SessionSettings) {
    let (sink, stream) = socket.split();
    run_session(stream, sink, hub, handler, settings).await;
}

/// Register a session over the given transport halves and run both pumps.
///
/// Returns the reason the inbound pump stopped. By the time this returns
/// the session is unregistered and the outbound pump has finished.
pub async fn run_session<R, W, E>(
    stream: R,
    sink: W,
    hub: Hub,
    handler: Arc<dyn Handler>,
    settings: SessionSettings,
) -> ReadError
where
    R: Stream<Item = Result<Message, E>> + Unpin + Send,
    E: fmt::Display + Send,
    W: Sink<Message> + Unpin + Send + 'static,
    W::Error: fmt::Display,
{
    let (session, queue) = Session::new(hub.clone(), &settings);
    hub.register(&session);
    metrics::record_session_opened();
    tracing::info!(session_id = %session.id(), "Session opened");

    let teardown = TeardownGuard(session.clone());
    let writer = tokio::spawn(outbound(session.clone(), sink, queue, settings.clone()));

    let reason = read_pump(&session, stream, handler.as_ref(), &settings).await;
    if reason.is_graceful() {
        tracing::info!(session_id = %session.id(), reason = %reason, "Session ended");
    } else {
        tracing::warn!(session_id = %session.id(), reason = %reason, "Session ended");
    }
    drop(teardown);

    if let Err(e) = writer.await {
        tracing::error!(session_id = %session.id(), error = %e, "Outbound task aborted");
    }
    metrics::record_session_closed(session.age());
    reason
}

/// Closes the session even if the inbound pump unwinds.
struct TeardownGuard(Session);

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        self.0.close();
    }
}

async fn outbound<W>(session: Session, sink: W, queue: OutboundQueue, settings: SessionSettings)
where
    W: Sink<Message> + Unpin,
    W::Error: fmt::Display,
{
    match catch_panic(write_pump(&session, sink, queue, &settings)).await {
        Ok(Ok(())) => tracing::debug!(session_id = %session.id(), "Outbound pump stopped"),
        Ok(Err(e)) => tracing::warn!(session_id = %session.id(), error = %e, "Outbound pump failed"),
        Err(report) => tracing::error!(
            session_id = %session.id(),
            panic = %report.message,
            location = %report.location,
            backtrace = %report.backtrace,
            "Outbound pump panicked"
        ),
    }
    session.close();
}

/// Read frames and dispatch them sequentially until something stops the loop.
pub(crate) async fn read_pump<R, E>(
    session: &Session,
    mut stream: R,
    handler: &dyn Handler,
    settings: &SessionSettings,
) -> ReadError
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
{
    let mut deadline = Instant::now() + settings.read_deadline;

    loop {
        let read = tokio::select! {
            biased;
            _ = session.closed() => return ReadError::TornDown,
            read = time::timeout_at(deadline, stream.next()) => read,
        };
        let message = match read {
            Err(_) => return ReadError::DeadlineExceeded(settings.read_deadline),
            Ok(None) => return ReadError::PeerClosed,
            Ok(Some(Err(e))) => return ReadError::Transport(e.to_string()),
            Ok(Some(Ok(message))) => message,
        };

        let decoded = match &message {
            Message::Text(text) => decode(text.as_str().as_bytes(), settings.max_message_size),
            Message::Binary(data) => decode(data, settings.max_message_size),
            Message::Pong(_) => {
                deadline = Instant::now() + settings.read_deadline;
                tracing::trace!(session_id = %session.id(), "Pong received");
                continue;
            }
            Message::Ping(_) => continue,
            Message::Close(_) => return ReadError::PeerClosed,
        };
        let request = match decoded {
            Ok(request) => request,
            Err(e) => return e,
        };

        metrics::record_message(request.code().as_str());
        let started = std::time::Instant::now();
        let outcome = handler.handle(session, &request).await;
        metrics::record_dispatch_duration(started.elapsed());

        if let Err(e) = outcome {
            return ReadError::Handler(e);
        }
    }
}

fn decode(frame: &[u8], limit: usize) -> Result<Request, ReadError> {
    if frame.len() > limit {
        return Err(ReadError::MessageTooLarge {
            size: frame.len(),
            limit,
        });
    }
    Ok(Request::from_slice(frame)?)
}

/// Drain the outbound queue into the socket and keep the peer alive.
pub(crate) async fn write_pump<W>(
    session: &Session,
    mut sink: W,
    mut queue: OutboundQueue,
    settings: &SessionSettings,
) -> Result<(), WriteError>
where
    W: Sink<Message> + Unpin,
    W::Error: fmt::Display,
{
    let mut ticker = time::interval_at(Instant::now() + settings.ping_period, settings.ping_period);

    loop {
        tokio::select! {
            queued = queue.recv() => {
                let Some(first) = queued else {
                    send_close(&mut sink, settings.write_deadline).await;
                    return Ok(());
                };
                let frame = coalesce(first, &mut queue);
                write_frame(&mut sink, Message::Text(frame.into()), settings.write_deadline).await?;
            }
            _ = ticker.tick() => {
                write_frame(&mut sink, Message::Ping(Bytes::new()), settings.write_deadline).await?;
                tracing::trace!(session_id = %session.id(), "Ping sent");
            }
            _ = session.closed() => {
                send_close(&mut sink, settings.write_deadline).await;
                return Ok(());
            }
        }
    }
}

/// Join everything already waiting behind `first` into one newline
/// separated frame.
fn coalesce(first: String, queue: &mut OutboundQueue) -> String {
    let mut frame = first;
    for _ in 0..queue.len() {
        match queue.try_recv() {
            Ok(next) => {
                frame.push('\n');
                frame.push_str(&next);
            }
            Err(_) => break,
        }
    }
    frame
}

async fn write_frame<W>(sink: &mut W, message: Message, deadline: Duration) -> Result<(), WriteError>
where
    W: Sink<Message> + Unpin,
    W::Error: fmt::Display,
{
    match time::timeout(deadline, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(WriteError::Transport(e.to_string())),
        Err(_) => Err(WriteError::DeadlineExceeded(deadline)),
    }
}

async fn send_close<W>(sink: &mut W, deadline: Duration)
where
    W: Sink<Message> + Unpin,
    W::Error: fmt::Display,
{
    if let Err(e) = write_frame(sink, Message::Close(None), deadline).await {
        tracing::debug!(error = %e, "Close frame not delivered");
    }
}
