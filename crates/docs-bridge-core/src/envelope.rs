//! Wire envelopes exchanged with the host page.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::registry::CallId;

/// Event tag of an outgoing call.
pub const CALL_EVENT: &str = "static-docs-bridge-call";

/// Event tag of an incoming response.
pub const RESPONSE_EVENT: &str = "static-docs-bridge-response";

const MISSING_ERROR: &str = "bridge response carried neither a response nor an error";

/// Message on the bridge channel, tagged by `event`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum BridgeMessage {
    /// Request from the embedded page to the host.
    #[serde(rename = "static-docs-bridge-call")]
    Call(CallEnvelope),
    /// Reply from the host to the embedded page.
    #[serde(rename = "static-docs-bridge-response")]
    Response(ResponseEnvelope),
}

/// Request to invoke `module.api` on the host page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEnvelope {
    pub id: CallId,
    pub module: String,
    pub api: String,
    #[serde(default)]
    pub args: Value,
}

impl CallEnvelope {
    /// Route key in `module.api` form.
    #[must_use]
    pub fn route(&self) -> String {
        format!("{}.{}", self.module, self.api)
    }
}

/// Reply to a [`CallEnvelope`] with the same `id`.
///
/// A present `response` key means success even when its value is `null`,
/// so the field keeps `Some(Value::Null)` distinct from an absent key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub id: CallId,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub response: Option<Value>,
    #[serde(
        default,
        deserialize_with = "error_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<String>,
}

impl ResponseEnvelope {
    /// Successful reply.
    #[must_use]
    pub const fn success(id: CallId, response: Value) -> Self {
        Self {
            id,
            response: Some(response),
            error: None,
        }
    }

    /// Failed reply.
    #[must_use]
    pub fn failure(id: CallId, error: impl Into<String>) -> Self {
        Self {
            id,
            response: None,
            error: Some(error.into()),
        }
    }

    /// Split into the payload or the remote error text.
    ///
    /// # Errors
    /// Returns the error description when no `response` key was present.
    pub fn into_outcome(self) -> Result<Value, String> {
        match self.response {
            Some(value) => Ok(value),
            None => Err(self.error.unwrap_or_else(|| MISSING_ERROR.to_string())),
        }
    }
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Hosts may send any JSON as the error; non-strings keep their JSON text.
fn error_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    })
}

/// Classification of a raw inbound message.
#[derive(Debug)]
pub enum Inbound {
    /// Some other traffic on the channel.
    Unrelated,
    /// A decoded bridge response.
    Response(ResponseEnvelope),
    /// Tagged as a bridge response but not decodable.
    Malformed(serde_json::Error),
}

/// Classify a raw message received from the host window.
#[must_use]
pub fn parse_response(raw: Value) -> Inbound {
    if raw.get("event").and_then(Value::as_str) != Some(RESPONSE_EVENT) {
        return Inbound::Unrelated;
    }
    match serde_json::from_value::<ResponseEnvelope>(raw) {
        Ok(response) => Inbound::Response(response),
        Err(e) => Inbound::Malformed(e),
    }
}

/// Origin a call is posted to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TargetOrigin {
    /// Any origin (`*`).
    Any,
    /// A single exact origin such as `https://host.example`.
    Exact(String),
}

impl From<String> for TargetOrigin {
    fn from(origin: String) -> Self {
        if origin == "*" {
            Self::Any
        } else {
            Self::Exact(origin)
        }
    }
}

impl From<TargetOrigin> for String {
    fn from(origin: TargetOrigin) -> Self {
        match origin {
            TargetOrigin::Any => "*".to_string(),
            TargetOrigin::Exact(origin) => origin,
        }
    }
}

impl fmt::Display for TargetOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Exact(origin) => f.write_str(origin),
        }
    }
}
