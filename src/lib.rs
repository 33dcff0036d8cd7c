//! Request routing over WebSocket connections.
//!
//! Clients send JSON requests tagged with a code; the server dispatches each
//! one through a middleware chain to the handler registered for that code,
//! and handlers reply asynchronously through the client's session.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod message;
pub mod middleware;
pub mod net;
pub mod observability;
pub mod routing;

pub use config::ServerConfig;
pub use http::WsServer;
pub use lifecycle::Shutdown;
pub use message::{Request, RequestCode, Response};
pub use middleware::{Chain, Middleware, Next, Recovery};
pub use net::{Hub, Session, SessionId, SessionSettings};
pub use routing::{Handler, HandlerError, HandlerResult, Router};
