//! Failure containment for the rest of a chain.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use async_trait::async_trait;
use futures_util::FutureExt;

use super::chain::{Middleware, Next};
use crate::message::{Request, Response};
use crate::net::Session;
use crate::observability::metrics;
use crate::routing::HandlerResult;

/// Message sent to the client when notification is enabled.
pub const INTERNAL_ERROR_MESSAGE: &str = "internal server error";

/// Catches panics and errors from everything after it in the chain.
///
/// A contained failure is logged and counted; the session keeps reading.
/// Panics are logged with the location and backtrace of the panic site.
/// By default the client hears nothing, matching the behaviour of a
/// handler that simply never replied.
#[derive(Debug, Clone, Copy, Default)]
pub struct Recovery {
    notify_client: bool,
}

impl Recovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also send the client an error response for the failed request.
    pub fn notify_client(mut self) -> Self {
        self.notify_client = true;
        self
    }
}

#[async_trait]
impl Middleware for Recovery {
    async fn handle(&self, session: &Session, request: &Request, next: Next) -> HandlerResult {
        let kind = match catch_panic(next.run(session, request)).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => {
                tracing::error!(
                    session_id = %session.id(),
                    code = %request.code(),
                    kind = e.kind(),
                    error = %e,
                    "Recovered from handler failure"
                );
                e.kind()
            }
            Err(report) => {
                tracing::error!(
                    session_id = %session.id(),
                    code = %request.code(),
                    kind = "panic",
                    error = %report.message,
                    location = %report.location,
                    backtrace = %report.backtrace,
                    "Recovered from handler failure"
                );
                "panic"
            }
        };
        metrics::record_handler_failure(kind);

        if self.notify_client {
            let response = Response::failure(request.code().clone(), INTERNAL_ERROR_MESSAGE);
            session.send_response(&response).await;
        }
        Ok(())
    }
}

/// A caught panic, described at the point it was raised.
#[derive(Debug)]
pub struct PanicReport {
    pub message: String,
    /// `file:line:column` of the panic, or `unknown`.
    pub location: String,
    pub backtrace: Backtrace,
}

struct PanicSite {
    location: String,
    backtrace: Backtrace,
}

thread_local! {
    static PANIC_SITE: RefCell<Option<PanicSite>> = const { RefCell::new(None) };
}

/// Chain a panic hook that records where each panic happened.
///
/// The previous hook still runs, so default panic output is unchanged.
fn install_site_hook() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let site = PanicSite {
                location: info
                    .location()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "unknown".to_owned()),
                backtrace: Backtrace::force_capture(),
            };
            PANIC_SITE.with(|slot| *slot.borrow_mut() = Some(site));
            previous(info);
        }));
    });
}

/// Run a future, turning a panic into a [`PanicReport`].
///
/// The hook runs on the panicking thread and the unwind is caught on the
/// same poll, so the recorded site belongs to this panic.
pub async fn catch_panic<F: Future>(future: F) -> Result<F::Output, PanicReport> {
    install_site_hook();
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(output) => Ok(output),
        Err(payload) => {
            let site = PANIC_SITE.with(|slot| slot.borrow_mut().take());
            let (location, backtrace) = match site {
                Some(site) => (site.location, site.backtrace),
                None => ("unknown".to_owned(), Backtrace::disabled()),
            };
            Err(PanicReport {
                message: panic_message(payload.as_ref()),
                location,
                backtrace,
            })
        }
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::Chain;
    use crate::net::{Hub, SessionSettings};
    use crate::routing::{handler_fn, Handler, HandlerError};

    struct Explodes;

    #[async_trait]
    impl Handler for Explodes {
        async fn handle(&self, _session: &Session, _request: &Request) -> HandlerResult {
            panic!("handler exploded")
        }
    }

    fn chain(recovery: Recovery, handler: impl Handler + 'static) -> Chain {
        let mut chain = Chain::new();
        chain.use_middleware(recovery).use_handler(handler);
        chain
    }

    #[tokio::test]
    async fn panic_is_contained() {
        let (session, mut outbound) = Session::new(Hub::spawn(), &SessionSettings::default());
        let chain = chain(Recovery::new(), Explodes);

        chain.serve_message(&session, &Request::new("ANY", None)).await.unwrap();
        assert!(outbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn error_is_contained() {
        let (session, _outbound) = Session::new(Hub::spawn(), &SessionSettings::default());
        let chain = chain(
            Recovery::new(),
            handler_fn(|_, _| async { Err(HandlerError::failed("boom")) }),
        );

        assert!(chain.serve_message(&session, &Request::new("ANY", None)).await.is_ok());
    }

    #[tokio::test]
    async fn session_keeps_serving_after_contained_panic() {
        let (session, mut outbound) = Session::new(Hub::spawn(), &SessionSettings::default());
        let mut router = crate::routing::Router::new();
        router.route("BOOM", Explodes).route_fn("PING", |session: Session, _| async move {
            session.send_response(&Response::ok("PING", "Pong")).await;
            Ok(())
        });
        let chain = chain(Recovery::new(), router);

        chain.serve_message(&session, &Request::new("BOOM", None)).await.unwrap();
        chain.serve_message(&session, &Request::new("PING", None)).await.unwrap();
        assert_eq!(
            outbound.recv().await.unwrap(),
            r#"{"code":"PING","error":false,"content":"Pong"}"#
        );
    }

    #[tokio::test]
    async fn notifies_client_when_enabled() {
        let (session, mut outbound) = Session::new(Hub::spawn(), &SessionSettings::default());
        let chain = chain(Recovery::new().notify_client(), Explodes);

        chain.serve_message(&session, &Request::new("ANY", None)).await.unwrap();
        assert_eq!(
            outbound.recv().await.unwrap(),
            r#"{"code":"ANY","error":true,"message":"internal server error"}"#
        );
    }

    #[test]
    fn panic_payload_text() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }

    async fn explode() {
        panic!("raised here")
    }

    #[tokio::test]
    async fn report_points_at_the_panic_site() {
        let report = catch_panic(explode()).await.unwrap_err();
        assert_eq!(report.message, "raised here");
        assert!(report.location.starts_with("src/middleware/recovery.rs:"), "{}", report.location);
        assert_eq!(report.backtrace.status(), std::backtrace::BacktraceStatus::Captured);
    }

    #[tokio::test]
    async fn reports_do_not_leak_between_panics() {
        assert!(catch_panic(explode()).await.is_err());
        assert_eq!(catch_panic(async { 7 }).await.unwrap(), 7);

        let report = catch_panic(async {
            let payload: Box<dyn Any + Send> = Box::new(7_u8);
            std::panic::resume_unwind(payload)
        })
        .await
        .unwrap_err();
        assert_eq!(report.location, "unknown");
    }
}
