//! Connection layer subsystem.
//!
//! # Data Flow
//! ```text
//! Upgraded WebSocket
//!     → session.rs (Session created, registered with the Hub)
//!     → pump.rs
//!         inbound:  read frame → Request → handler chain (one at a time)
//!         outbound: queue → coalesced text frame | keepalive ping
//!     → teardown: unregister + close, from whichever pump stops first
//!
//! hub.rs:
//!     register / unregister / queries → one coordinating loop → id → session map
//! ```
//!
//! # Design Decisions
//! - The hub map is only touched by its own loop (commands over a FIFO channel)
//! - The hub keeps weak entries; each session's pumps own its transport
//! - Read deadline refreshed only by pong frames (dead peer detection)
//! - One-slot outbound queue is the only back-pressure
//! - Teardown is idempotent and may be triggered by either pump

pub mod hub;
pub mod pump;
pub mod session;

pub use hub::{Hub, HubLoop};
pub use pump::{run_session, serve, ReadError, WriteError};
pub use session::{OutboundQueue, Session, SessionId, SessionSettings, WeakSession};
