//! Bridge error taxonomy.

use std::time::Duration;

use thiserror::Error;

use crate::port::PortError;
use crate::registry::CallId;

/// Error settling a bridge call.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Not running on static docs (host: {host})")]
    UnsupportedEnvironment { host: String },
    #[error("Bridge call {id} failed: {message}")]
    Remote { id: CallId, message: String },
    #[error("Bridge call {id} timed out after {after:?}")]
    Timeout { id: CallId, after: Duration },
    #[error("Bridge call {id} dropped before a response arrived")]
    Disconnected { id: CallId },
    #[error("Bridge call ids exhausted")]
    IdsExhausted,
    #[error("Port error: {0}")]
    Port(#[from] PortError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BridgeError {
    /// Whether the call was refused before anything was sent.
    #[must_use]
    pub const fn is_unsupported_environment(&self) -> bool {
        matches!(self, Self::UnsupportedEnvironment { .. })
    }
}
