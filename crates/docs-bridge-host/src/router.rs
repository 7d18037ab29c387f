//! Routes bridge calls to host API handlers.

use std::{collections::HashMap, future::Future, sync::Arc};

use async_trait::async_trait;
use docs_bridge_core::{BridgeMessage, CallEnvelope, ParentWindow, ResponseEnvelope};
use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinHandle;

/// Handler error, sent back to the caller as the response's `error`.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),
    #[error("{0}")]
    Failed(String),
}

impl From<serde_json::Error> for HandlerError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidArgs(e.to_string())
    }
}

/// Trait for one host API (`module.api`).
///
/// Implement this trait to expose host functionality to embedded pages.
#[async_trait]
pub trait ApiHandler: Send + Sync {
    /// Handle a call.
    ///
    /// # Arguments
    /// * `args` - The call's `args` payload, as sent
    ///
    /// # Returns
    /// The `response` payload, or the error to report.
    async fn handle(&self, args: Value) -> Result<Value, HandlerError>;
}

/// [`ApiHandler`] backed by an async closure.
pub struct FnHandler<F>(F);

/// Wrap an async closure as an [`ApiHandler`].
pub const fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    FnHandler(f)
}

#[async_trait]
impl<F, Fut> ApiHandler for FnHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    async fn handle(&self, args: Value) -> Result<Value, HandlerError> {
        (self.0)(args).await
    }
}

/// Host-side router from `module.api` to handlers.
#[derive(Clone, Default)]
pub struct HostRouter {
    routes: HashMap<(String, String), Arc<dyn ApiHandler>>,
}

impl HostRouter {
    /// Create an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `module.api`, replacing any previous one.
    #[must_use]
    pub fn route(
        mut self,
        module: impl Into<String>,
        api: impl Into<String>,
        handler: impl ApiHandler + 'static,
    ) -> Self {
        self.routes
            .insert((module.into(), api.into()), Arc::new(handler));
        self
    }

    /// Whether a handler is registered for `module.api`.
    #[must_use]
    pub fn has_route(&self, module: &str, api: &str) -> bool {
        self.routes
            .contains_key(&(module.to_string(), api.to_string()))
    }

    /// Run the handler for `call` and build its response.
    pub async fn dispatch(&self, call: CallEnvelope) -> ResponseEnvelope {
        let key = (call.module, call.api);
        let Some(handler) = self.routes.get(&key).cloned() else {
            tracing::warn!("No handler for bridge call {}.{}", key.0, key.1);
            return ResponseEnvelope::failure(
                call.id,
                format!("No handler registered for {}.{}", key.0, key.1),
            );
        };

        match handler.handle(call.args).await {
            Ok(response) => ResponseEnvelope::success(call.id, response),
            Err(e) => {
                tracing::debug!(id = call.id, "Bridge handler {}.{} failed: {e}", key.0, key.1);
                ResponseEnvelope::failure(call.id, e.to_string())
            }
        }
    }

    /// Handle one serialized message; returns the response for a call.
    pub async fn handle_text(&self, text: &str) -> Option<ResponseEnvelope> {
        match serde_json::from_str::<BridgeMessage>(text) {
            Ok(BridgeMessage::Call(call)) => Some(self.dispatch(call).await),
            Ok(BridgeMessage::Response(response)) => {
                tracing::warn!(id = response.id, "Host received a bridge response; ignoring");
                None
            }
            Err(e) => {
                tracing::warn!("Invalid bridge message: {e}");
                None
            }
        }
    }

    /// Answer every call posted to `window` until the embedded page goes away.
    ///
    /// Calls are handled concurrently, so responses may be delivered in a
    /// different order than the calls arrived.
    pub fn serve(self: Arc<Self>, window: ParentWindow) -> JoinHandle<()> {
        let (mut posted, deliver) = window.into_parts();

        tokio::spawn(async move {
            while let Some(msg) = posted.recv().await {
                let BridgeMessage::Call(call) = msg.message else {
                    continue;
                };
                tracing::debug!(id = call.id, target_origin = %msg.target_origin, "Host received {}", call.route());

                let router = Arc::clone(&self);
                let deliver = deliver.clone();
                tokio::spawn(async move {
                    let response = router.dispatch(call).await;
                    let raw = match serde_json::to_value(BridgeMessage::Response(response)) {
                        Ok(raw) => raw,
                        Err(e) => {
                            tracing::error!("Failed to serialize bridge response: {e}");
                            return;
                        }
                    };
                    if deliver.send(raw).is_err() {
                        tracing::debug!("Embedded page went away before the response was sent");
                    }
                });
            }
        })
    }
}
