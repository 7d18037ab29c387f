//! UI docs API reference lookup.

use docs_bridge_core::{BridgeError, Dispatcher};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const MODULE: &str = "uidocs";

/// Known docset ids.
pub mod docsets {
    /// Bloks core components.
    pub const BLOKS_CORE: &str = "887372105406659";
}

/// Identifies one API entry in a docset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiQuery {
    pub name: String,
    pub framework: String,
    pub docset: String,
}

impl ApiQuery {
    /// Query for `name` in `framework` within `docset`.
    #[must_use]
    pub fn new(name: impl Into<String>, framework: impl Into<String>, docset: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            framework: framework.into(),
            docset: docset.into(),
        }
    }
}

/// Fetch the reference entry for an API.
///
/// # Errors
/// Returns the bridge error if the host cannot be reached or replies with an error.
pub async fn get_api(dispatcher: &Dispatcher, query: &ApiQuery) -> Result<Value, BridgeError> {
    dispatcher.call_with(MODULE, "getApi", query).await
}
