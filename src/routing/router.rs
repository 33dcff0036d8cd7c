//! Code lookup and dispatch.
//!
//! # Responsibilities
//! - Store one handler per request code
//! - Look up the handler for an inbound request
//! - Reply with the default response when nothing matches
//!
//! # Design Decisions
//! - Exact, case-sensitive match on the code
//! - Registering a code twice replaces the earlier handler
//! - Immutable after construction (shared via Arc without locks)

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use super::handler::{handler_fn, Handler, HandlerResult};
use crate::message::{Request, RequestCode, Response};
use crate::net::Session;
use crate::observability::metrics;

/// Maps request codes to handlers.
#[derive(Default)]
pub struct Router {
    handlers: HashMap<RequestCode, Arc<dyn Handler>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `code` to `handler`.
    pub fn route(&mut self, code: impl Into<RequestCode>, handler: impl Handler + 'static) -> &mut Self {
        let code = code.into();
        if self.handlers.insert(code.clone(), Arc::new(handler)).is_some() {
            tracing::warn!(code = %code, "Handler replaced for request code");
        }
        self
    }

    /// Bind `code` to an async function.
    pub fn route_fn<F, Fut>(&mut self, code: impl Into<RequestCode>, f: F) -> &mut Self
    where
        F: Fn(Session, Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.route(code, handler_fn(f))
    }

    pub fn has_route(&self, code: &str) -> bool {
        self.handlers.contains_key(code)
    }

    /// Registered codes, sorted.
    pub fn codes(&self) -> Vec<RequestCode> {
        let mut codes: Vec<RequestCode> = self.handlers.keys().cloned().collect();
        codes.sort();
        codes
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[async_trait]
impl Handler for Router {
    async fn handle(&self, session: &Session, request: &Request) -> HandlerResult {
        let Some(handler) = self.handlers.get(request.code()) else {
            tracing::debug!(
                session_id = %session.id(),
                code = %request.code(),
                "No handler for request code, sending default response"
            );
            metrics::record_unknown_code();
            session.send_response(&Response::empty()).await;
            return Ok(());
        };

        handler.handle(session, request).await
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router").field("codes", &self.codes()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{Hub, SessionSettings};
    use crate::routing::HandlerError;

    fn router() -> Router {
        let mut router = Router::new();
        router.route_fn("PING", |session: Session, _req: Request| async move {
            session.send_response(&Response::ok("PING", "Pong")).await;
            Ok(())
        });
        router
    }

    #[tokio::test]
    async fn dispatches_exact_code() {
        let (session, mut outbound) = Session::new(Hub::spawn(), &SessionSettings::default());
        Handler::handle(&router(), &session, &Request::new("PING", None)).await.unwrap();
        assert_eq!(
            outbound.recv().await.unwrap(),
            r#"{"code":"PING","error":false,"content":"Pong"}"#
        );
    }

    #[tokio::test]
    async fn unknown_code_gets_default_response() {
        let (session, mut outbound) = Session::new(Hub::spawn(), &SessionSettings::default());
        Handler::handle(&router(), &session, &Request::new("NO_SUCH_CODE", None)).await.unwrap();
        assert_eq!(outbound.recv().await.unwrap(), r#"{"code":"","error":false}"#);
    }

    #[tokio::test]
    async fn matching_is_case_sensitive() {
        let (session, mut outbound) = Session::new(Hub::spawn(), &SessionSettings::default());
        Handler::handle(&router(), &session, &Request::new("ping", None)).await.unwrap();
        assert_eq!(outbound.recv().await.unwrap(), r#"{"code":"","error":false}"#);
    }

    #[tokio::test]
    async fn handler_error_is_returned() {
        let mut router = Router::new();
        router.route_fn("FAIL", |_, _| async { Err(HandlerError::failed("boom")) });
        let (session, _outbound) = Session::new(Hub::spawn(), &SessionSettings::default());
        let err = Handler::handle(&router, &session, &Request::new("FAIL", None)).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn re_registration_replaces() {
        let mut router = router();
        router.route_fn("PING", |_, _| async { Ok(()) });
        assert_eq!(router.len(), 1);
        assert!(router.has_route("PING"));
        assert!(!router.has_route("PONG"));
    }

    #[test]
    fn codes_are_sorted() {
        let mut router = Router::new();
        router
            .route_fn("SET_MATCHING_MODE", |_, _| async { Ok(()) })
            .route_fn("PICK_USER", |_, _| async { Ok(()) })
            .route_fn("PING", |_, _| async { Ok(()) });
        let codes: Vec<String> = router.codes().iter().map(ToString::to_string).collect();
        assert_eq!(codes, ["PICK_USER", "PING", "SET_MATCHING_MODE"]);
    }
}
