//! Pending-call registry.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::oneshot;

use crate::envelope::ResponseEnvelope;
use crate::error::BridgeError;

/// Call identifier. Allocated from zero and never reused.
pub type CallId = u64;

pub(crate) type Settlement = Result<Value, BridgeError>;

/// What happened to an inbound response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settled {
    /// The matching call completed with a payload.
    Resolved(CallId),
    /// The matching call completed with the remote error.
    Rejected(CallId),
    /// No call with that id is pending.
    Unmatched(CallId),
}

/// In-flight calls keyed by id.
#[derive(Debug, Default)]
pub struct PendingCalls {
    next_id: CallId,
    entries: HashMap<CallId, oneshot::Sender<Settlement>>,
}

impl PendingCalls {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id and register its completion handle.
    ///
    /// Ids never wrap; `CallId::MAX` is never handed out.
    ///
    /// # Errors
    /// Returns `IdsExhausted` once every id has been used.
    pub(crate) fn register(&mut self) -> Result<(CallId, oneshot::Receiver<Settlement>), BridgeError> {
        let id = self.next_id;
        self.next_id = id.checked_add(1).ok_or_else(|| {
            tracing::error!("Bridge call ids exhausted");
            BridgeError::IdsExhausted
        })?;
        let (tx, rx) = oneshot::channel();
        self.entries.insert(id, tx);
        Ok((id, rx))
    }

    /// Drop an entry without settling it.
    pub(crate) fn remove(&mut self, id: CallId) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Settle the entry matching `response`, removing it.
    pub(crate) fn settle(&mut self, response: ResponseEnvelope) -> Settled {
        let id = response.id;
        let Some(tx) = self.entries.remove(&id) else {
            return Settled::Unmatched(id);
        };

        let (settlement, settled) = match response.into_outcome() {
            Ok(value) => (Ok(value), Settled::Resolved(id)),
            Err(message) => (
                Err(BridgeError::Remote { id, message }),
                Settled::Rejected(id),
            ),
        };

        // The caller may have given up on the result already.
        if tx.send(settlement).is_err() {
            tracing::debug!(id, "Bridge call settled after its caller went away");
        }
        settled
    }

    /// Number of calls awaiting a response.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no calls are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `id` is awaiting a response.
    #[must_use]
    pub fn contains(&self, id: CallId) -> bool {
        self.entries.contains_key(&id)
    }
}
