//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Request (code, body)
//!     → router.rs (exact code lookup)
//!     → handler.rs (matched Handler runs to completion)
//!     → Handler enqueues Responses on the Session
//!
//! Unknown code:
//!     → default Response {code: "", error: false} sent back
//! ```
//!
//! # Design Decisions
//! - Routes registered at startup through `&mut Router`, immutable once shared
//! - O(1) lookup via HashMap keyed by code
//! - Unknown codes are not client errors (silent default reply)
//! - Handlers report failure through `HandlerResult`, never through a reply

pub mod handler;
pub mod router;

pub use handler::{handler_fn, Handler, HandlerError, HandlerFn, HandlerResult};
pub use router::Router;
