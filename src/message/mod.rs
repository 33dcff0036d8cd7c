//! Wire message model.
//!
//! # Data Flow
//! ```text
//! Inbound frame (text or binary JSON)
//!     → request.rs (decode {code, body}, body kept verbatim)
//!     → dispatched by code through the middleware chain
//!
//! Handler output
//!     → response.rs ({code, error, message?, content?})
//!     → serialized once, queued on the session
//! ```
//!
//! # Design Decisions
//! - Codes are an open namespace: a newtype over `String`, no central enum
//! - Request bodies stay raw until a handler asks for a typed view
//! - Absent `message`/`content` fields are omitted from the wire

pub mod code;
pub mod request;
pub mod response;

pub use code::RequestCode;
pub use request::Request;
pub use response::Response;
