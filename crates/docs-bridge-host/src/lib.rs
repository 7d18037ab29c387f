//! Host-page side of the static docs bridge.
//!
//! Provides:
//! - `ApiHandler` trait and `HostRouter` for answering bridge calls
//! - WebSocket transport (feature: websocket)

pub mod router;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use router::{ApiHandler, FnHandler, HandlerError, HostRouter, handler_fn};
