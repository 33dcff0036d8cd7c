//! Middleware trait, continuation and chain composition.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::DispatchConfig;
use crate::message::Request;
use crate::net::Session;
use crate::routing::{Handler, HandlerResult};

use super::recovery::Recovery;

/// One link in a [`Chain`].
///
/// A middleware may do work before and after `next.run(..)`, call it more
/// than once, or not call it at all.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, session: &Session, request: &Request, next: Next) -> HandlerResult;
}

/// Continuation to the remainder of a chain.
#[derive(Clone)]
pub struct Next {
    links: Arc<[Arc<dyn Middleware>]>,
    index: usize,
}

impl Next {
    /// Run the rest of the chain.
    pub async fn run(&self, session: &Session, request: &Request) -> HandlerResult {
        match self.links.get(self.index) {
            Some(link) => {
                let next = Next {
                    links: Arc::clone(&self.links),
                    index: self.index + 1,
                };
                link.handle(session, request, next).await
            }
            None => Ok(()),
        }
    }

    /// Links left to run, the terminal one included.
    pub fn remaining(&self) -> usize {
        self.links.len().saturating_sub(self.index)
    }
}

/// Terminal link: does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

#[async_trait]
impl Middleware for Identity {
    async fn handle(&self, _session: &Session, _request: &Request, _next: Next) -> HandlerResult {
        Ok(())
    }
}

/// Adapter turning an async function into a [`Middleware`].
#[derive(Clone)]
pub struct MiddlewareFn<F> {
    f: F,
}

pub fn middleware_fn<F, Fut>(f: F) -> MiddlewareFn<F>
where
    F: Fn(Session, Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    MiddlewareFn { f }
}

#[async_trait]
impl<F, Fut> Middleware for MiddlewareFn<F>
where
    F: Fn(Session, Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn handle(&self, session: &Session, request: &Request, next: Next) -> HandlerResult {
        (self.f)(session.clone(), request.clone(), next).await
    }
}

/// Lifts a [`Handler`] into a middleware that runs it and then continues.
///
/// The rest of the chain runs even when the handler fails; the handler's
/// error wins over anything reported downstream.
pub struct Wrap<H> {
    handler: H,
}

pub fn wrap<H: Handler>(handler: H) -> Wrap<H> {
    Wrap { handler }
}

#[async_trait]
impl<H: Handler> Middleware for Wrap<H> {
    async fn handle(&self, session: &Session, request: &Request, next: Next) -> HandlerResult {
        let outcome = self.handler.handle(session, request).await;
        let rest = next.run(session, request).await;
        outcome.and(rest)
    }
}

/// Ordered composition of middlewares, itself a [`Handler`].
///
/// Built during setup with `&mut` access, then shared behind an `Arc`.
pub struct Chain {
    middlewares: Vec<Arc<dyn Middleware>>,
    links: Arc<[Arc<dyn Middleware>]>,
}

impl Chain {
    pub fn new() -> Self {
        Self::with(Vec::new())
    }

    /// Chain over the given middlewares, in order.
    pub fn with(middlewares: Vec<Arc<dyn Middleware>>) -> Self {
        let links = link(&middlewares);
        Self { middlewares, links }
    }

    /// The chain the server runs for a dispatch configuration: recovery
    /// first when enabled, then `handler`.
    pub fn for_dispatch(config: &DispatchConfig, handler: impl Handler + 'static) -> Self {
        let mut chain = Self::new();
        if config.recovery {
            let recovery = if config.notify_on_failure {
                Recovery::new().notify_client()
            } else {
                Recovery::new()
            };
            chain.use_middleware(recovery);
        }
        chain.use_handler(handler);
        chain
    }

    /// Append a middleware.
    pub fn use_middleware(&mut self, middleware: impl Middleware + 'static) -> &mut Self {
        self.middlewares.push(Arc::new(middleware));
        self.links = link(&self.middlewares);
        self
    }

    pub fn use_fn<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn(Session, Request, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.use_middleware(middleware_fn(f))
    }

    /// Append a handler via [`wrap`].
    pub fn use_handler(&mut self, handler: impl Handler + 'static) -> &mut Self {
        self.use_middleware(wrap(handler))
    }

    /// Number of middlewares added, not counting the terminal identity.
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Run the chain for one message.
    pub async fn serve_message(&self, session: &Session, request: &Request) -> HandlerResult {
        let head = Next {
            links: Arc::clone(&self.links),
            index: 0,
        };
        head.run(session, request).await
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain").field("len", &self.len()).finish()
    }
}

#[async_trait]
impl Handler for Chain {
    async fn handle(&self, session: &Session, request: &Request) -> HandlerResult {
        self.serve_message(session, request).await
    }
}

fn link(middlewares: &[Arc<dyn Middleware>]) -> Arc<[Arc<dyn Middleware>]> {
    let identity: Arc<dyn Middleware> = Arc::new(Identity);
    middlewares
        .iter()
        .cloned()
        .chain(std::iter::once(identity))
        .collect()
}
