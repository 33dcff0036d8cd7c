//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → shutdown_signal() resolves
//!
//! Shutdown (shutdown.rs):
//!     trigger() → every ShutdownSignal resolves → server stops accepting
//!               → hub closes live sessions (Close frame to each peer)
//! ```
//!
//! # Design Decisions
//! - Shutdown is level-triggered: late subscribers still observe it
//! - Live sessions are closed by the server once it stops accepting

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use signals::shutdown_signal;
