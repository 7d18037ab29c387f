//! Bloks design spec lookup.

use docs_bridge_core::{BridgeError, Dispatcher};
use serde::Serialize;
use serde_json::Value;

const MODULE: &str = "bloks";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpecInfoArgs<'a> {
    style_id: &'a str,
}

/// Fetch the design spec for a Bloks style.
///
/// # Errors
/// Returns the bridge error if the host cannot be reached or replies with an error.
pub async fn get_spec_info(dispatcher: &Dispatcher, style_id: &str) -> Result<Value, BridgeError> {
    dispatcher
        .call_with(MODULE, "getSpecInfo", &SpecInfoArgs { style_id })
        .await
}
