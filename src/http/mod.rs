//! HTTP boundary subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, tracing layer)
//!         GET {path}  → WebSocket upgrade → net::serve (one session)
//!         GET /status → status.rs (JSON snapshot)
//! ```

pub mod server;
pub mod status;

pub use server::{AppState, ServerError, WsServer};
pub use status::SystemStatus;
