//! Handler capability and function adapter.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::message::Request;
use crate::net::Session;

/// Outcome of dispatching one message.
pub type HandlerResult = Result<(), HandlerError>;

/// Boxed error type accepted from application code.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure reported by a handler for a single message.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The request body did not decode into the type the handler expects.
    #[error("invalid request body: {0}")]
    InvalidBody(#[from] serde_json::Error),

    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Other(#[from] BoxError),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidBody(_) => "invalid_body",
            Self::Failed(_) => "failed",
            Self::Other(_) => "other",
        }
    }
}

/// Responds to one inbound message.
///
/// Handlers produce no value: replies are side effects through
/// [`Session::send_response`]. Dispatch for a session is sequential, so a
/// slow handler delays the next read on that connection.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, session: &Session, request: &Request) -> HandlerResult;
}

#[async_trait]
impl<H: Handler + ?Sized> Handler for Arc<H> {
    async fn handle(&self, session: &Session, request: &Request) -> HandlerResult {
        (**self).handle(session, request).await
    }
}

#[async_trait]
impl<H: Handler + ?Sized> Handler for Box<H> {
    async fn handle(&self, session: &Session, request: &Request) -> HandlerResult {
        (**self).handle(session, request).await
    }
}

/// Adapter turning an async function into a [`Handler`].
///
/// The function receives owned clones of the session handle and request so
/// the returned future can be `'static`.
#[derive(Clone)]
pub struct HandlerFn<F> {
    f: F,
}

/// Wrap `f` as a [`Handler`].
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Session, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    HandlerFn { f }
}

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Session, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn handle(&self, session: &Session, request: &Request) -> HandlerResult {
        (self.f)(session.clone(), request.clone()).await
    }
}
