//! Middleware subsystem.
//!
//! # Data Flow
//! ```text
//! Request
//!     → Chain (Handler impl)
//!     → middleware 0 → middleware 1 → … → identity terminal
//!       each link decides whether, and how often, to call `next`
//! ```
//!
//! # Design Decisions
//! - A chain is built once and never mutated while serving
//! - The terminal link is always the identity middleware
//! - Handlers join a chain through [`wrap`]: the handler runs, then the rest
//! - Recovery belongs first so it observes everything after it

pub mod chain;
pub mod recovery;

pub use chain::{middleware_fn, wrap, Chain, Identity, Middleware, MiddlewareFn, Next, Wrap};
pub use recovery::{catch_panic, panic_message, PanicReport, Recovery};
