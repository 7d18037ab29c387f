//! Bridge call dispatcher.
//!
//! Posts tagged calls to the host window and settles each one when the
//! response carrying its id comes back. Responses are matched by id only, so
//! they may arrive in any order and interleaved with unrelated traffic.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures::StreamExt;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::BridgeConfig;
use crate::envelope::{BridgeMessage, CallEnvelope, Inbound, parse_response};
use crate::error::BridgeError;
use crate::port::{EmbeddedFrame, InboundStream, MessagePort};
use crate::registry::{CallId, PendingCalls, Settled, Settlement};

struct Inner {
    config: BridgeConfig,
    port: Arc<dyn MessagePort>,
    pending: Mutex<PendingCalls>,
    /// Taken by the listener on first use.
    inbound: Mutex<Option<InboundStream>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    fn pending(&self) -> MutexGuard<'_, PendingCalls> {
        lock(&self.pending)
    }

    fn forget(&self, id: CallId) -> bool {
        self.pending().remove(id)
    }

    fn handle_inbound(&self, raw: Value) -> Option<Settled> {
        let response = match parse_response(raw) {
            Inbound::Unrelated => return None,
            Inbound::Malformed(e) => {
                tracing::warn!("Dropping malformed bridge response: {e}");
                return None;
            }
            Inbound::Response(response) => response,
        };

        let settled = self.pending().settle(response);
        match settled {
            Settled::Resolved(id) => tracing::debug!(id, "Bridge call resolved"),
            Settled::Rejected(id) => tracing::debug!(id, "Bridge call rejected"),
            Settled::Unmatched(id) => {
                tracing::error!(id, "Received response for id {id} with no matching receiver");
            }
        }
        Some(settled)
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(listener) = lock(&self.listener).take() {
            listener.abort();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn listen(inner: Weak<Inner>, mut inbound: InboundStream) {
    while let Some(raw) = inbound.next().await {
        let Some(dispatcher) = inner.upgrade() else {
            break;
        };
        dispatcher.handle_inbound(raw);
    }
    tracing::debug!("Bridge response listener stopped");
}

/// Issues bridge calls and correlates their responses.
///
/// Owns its id counter and pending-call registry. Construct one per embedded
/// page and share it by cloning.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    /// Create a dispatcher over `port`, settling calls from `inbound`.
    ///
    /// Nothing is read from `inbound` until the first call is issued.
    #[must_use]
    pub fn new(config: BridgeConfig, port: impl MessagePort + 'static, inbound: InboundStream) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                port: Arc::new(port),
                pending: Mutex::new(PendingCalls::new()),
                inbound: Mutex::new(Some(inbound)),
                listener: Mutex::new(None),
            }),
        }
    }

    /// Create a dispatcher bound to an in-memory frame.
    #[must_use]
    pub fn from_frame(config: BridgeConfig, frame: EmbeddedFrame) -> Self {
        Self::new(config, frame.port, frame.inbound)
    }

    /// Call `module.api` on the host and wait for its response.
    ///
    /// # Errors
    /// Returns `UnsupportedEnvironment` when the host is not allow-listed,
    /// `Remote` when the host replies with an error, and port or timeout
    /// errors when the call cannot complete.
    pub async fn call(&self, module: &str, api: &str, args: Value) -> Result<Value, BridgeError> {
        self.issue(module, api, args).await?.wait().await
    }

    /// Like [`Dispatcher::call`] with arguments serialized from `args`.
    ///
    /// # Errors
    /// Same as [`Dispatcher::call`], plus `Json` if `args` does not serialize.
    pub async fn call_with<A>(&self, module: &str, api: &str, args: &A) -> Result<Value, BridgeError>
    where
        A: Serialize + ?Sized,
    {
        let args = serde_json::to_value(args)?;
        self.call(module, api, args).await
    }

    /// Post a call and return a handle to its pending result.
    ///
    /// The call is registered before it is posted, so a response can never
    /// beat its registration.
    ///
    /// # Errors
    /// Returns `UnsupportedEnvironment` without posting anything when the
    /// host is not allow-listed, `IdsExhausted` if no id is left, or the port
    /// error if posting fails.
    pub async fn issue(&self, module: &str, api: &str, args: Value) -> Result<PendingCall, BridgeError> {
        let config = &self.inner.config;
        if !config.is_allowed() {
            tracing::warn!(host = %config.host, module, api, "Refusing bridge call outside static docs");
            return Err(BridgeError::UnsupportedEnvironment {
                host: config.host.clone(),
            });
        }

        self.ensure_listener();

        let (id, rx) = self.inner.pending().register()?;
        let message = BridgeMessage::Call(CallEnvelope {
            id,
            module: module.to_string(),
            api: api.to_string(),
            args,
        });
        let target_origin = config.target_origin();

        if let Err(e) = self.inner.port.post_message(&message, &target_origin).await {
            self.inner.forget(id);
            tracing::error!("Failed to post bridge call {id}: {e}");
            return Err(e.into());
        }
        tracing::debug!(id, module, api, %target_origin, "Bridge call posted");

        Ok(PendingCall {
            id,
            rx,
            timeout: config.call_timeout(),
            inner: Arc::downgrade(&self.inner),
        })
    }

    fn ensure_listener(&self) {
        let Some(inbound) = lock(&self.inner.inbound).take() else {
            return;
        };
        let handle = tokio::spawn(listen(Arc::downgrade(&self.inner), inbound));
        *lock(&self.inner.listener) = Some(handle);
        tracing::debug!("Bridge response listener installed");
    }

    /// Number of calls awaiting a response.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending().len()
    }

    /// Whether call `id` is awaiting a response.
    #[must_use]
    pub fn is_pending(&self, id: CallId) -> bool {
        self.inner.pending().contains(id)
    }

    /// Whether the response listener has been installed.
    #[must_use]
    pub fn listener_installed(&self) -> bool {
        lock(&self.inner.inbound).is_none()
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }
}

/// An issued call awaiting its response.
#[must_use = "a pending call does nothing unless waited on"]
pub struct PendingCall {
    id: CallId,
    rx: oneshot::Receiver<Settlement>,
    timeout: Option<Duration>,
    inner: Weak<Inner>,
}

impl PendingCall {
    /// Id carried by the posted envelope.
    #[must_use]
    pub const fn id(&self) -> CallId {
        self.id
    }

    /// Wait for the matching response.
    ///
    /// Without a configured timeout this waits for as long as the host takes.
    ///
    /// # Errors
    /// Returns `Remote` for an error reply, `Timeout` if the configured
    /// timeout expires, or `Disconnected` if the dispatcher was dropped.
    pub async fn wait(self) -> Result<Value, BridgeError> {
        let Self {
            id,
            mut rx,
            timeout,
            inner,
        } = self;

        let received = match timeout {
            None => rx.await,
            Some(after) => match tokio::time::timeout(after, &mut rx).await {
                Ok(received) => received,
                Err(_) => {
                    let removed = inner.upgrade().is_some_and(|inner| inner.forget(id));
                    // Settled between the deadline and the removal.
                    if !removed {
                        if let Ok(settlement) = rx.try_recv() {
                            return settlement;
                        }
                    }
                    tracing::warn!(id, ?after, "Bridge call timed out");
                    return Err(BridgeError::Timeout { id, after });
                }
            },
        };

        received.map_err(|_| BridgeError::Disconnected { id })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{ResponseEnvelope, TargetOrigin};
    use crate::port::{ParentWindow, PortError, window_pair};
    use serde_json::json;
    use tokio_test::assert_pending;

    fn dispatcher_on(host: &str) -> (Dispatcher, ParentWindow) {
        let (frame, parent) = window_pair();
        (Dispatcher::from_frame(BridgeConfig::for_host(host), frame), parent)
    }

    #[tokio::test]
    async fn test_unsupported_environment_sends_nothing() {
        let (dispatcher, mut parent) = dispatcher_on("example.com");

        let err = dispatcher
            .call("feedback", "reportFeatureUsage", json!({}))
            .await
            .unwrap_err();

        assert!(err.is_unsupported_environment());
        assert!(parent.try_next_posted().is_none());
        assert!(!dispatcher.listener_installed());
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_feature_usage_round_trip() {
        let (dispatcher, mut parent) = dispatcher_on("localhost");

        let pending = dispatcher
            .issue(
                "feedback",
                "reportFeatureUsage",
                json!({"featureName": "x", "id": "1"}),
            )
            .await
            .unwrap();
        assert_eq!(pending.id(), 0);
        assert!(dispatcher.listener_installed());

        let posted = parent.next_posted().await.unwrap();
        assert_eq!(posted.target_origin, TargetOrigin::Any);
        let BridgeMessage::Call(call) = posted.message else {
            panic!("expected a call envelope");
        };
        assert_eq!(call.id, 0);
        assert_eq!(call.module, "feedback");
        assert_eq!(call.api, "reportFeatureUsage");
        assert!(parent.try_next_posted().is_none());

        parent
            .deliver(json!({"event": "static-docs-bridge-response", "id": 0, "response": null}))
            .unwrap();

        assert_eq!(pending.wait().await.unwrap(), Value::Null);
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_static_docs_posts_to_parent_origin() {
        let (dispatcher, mut parent) = dispatcher_on("staticdocs.thefacebook.com");

        let _pending = dispatcher
            .issue("bloks", "getSpecInfo", json!({"styleId": "abc"}))
            .await
            .unwrap();

        let posted = parent.next_posted().await.unwrap();
        assert_eq!(
            posted.target_origin,
            TargetOrigin::Exact("https://www.internalfb.com".into())
        );
    }

    #[tokio::test]
    async fn test_out_of_order_responses_among_unrelated_traffic() {
        let (dispatcher, parent) = dispatcher_on("localhost");

        let a = dispatcher.issue("uidocs", "getApi", json!({})).await.unwrap();
        let b = dispatcher.issue("uidocs", "getApi", json!({})).await.unwrap();
        let (a_id, b_id) = (a.id(), b.id());
        assert_ne!(a_id, b_id);
        assert_eq!(dispatcher.pending_count(), 2);

        parent.deliver(json!({"event": "some-other-widget", "id": a_id})).unwrap();
        parent.deliver(json!(42)).unwrap();
        parent
            .deliver(json!({"event": "static-docs-bridge-call", "id": a_id, "module": "m", "api": "a"}))
            .unwrap();
        parent.respond(ResponseEnvelope::success(b_id, json!("b"))).unwrap();

        assert_eq!(b.wait().await.unwrap(), json!("b"));
        assert!(dispatcher.is_pending(a_id));
        assert!(!dispatcher.is_pending(b_id));

        parent.respond(ResponseEnvelope::failure(a_id, "nope")).unwrap();
        match a.wait().await {
            Err(BridgeError::Remote { id, message }) => {
                assert_eq!(id, a_id);
                assert_eq!(message, "nope");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_structured_error_rejects_call() {
        let (dispatcher, parent) = dispatcher_on("localhost");

        let pending = dispatcher.issue("bloks", "getSpecInfo", json!({})).await.unwrap();
        let id = pending.id();
        parent
            .deliver(json!({
                "event": "static-docs-bridge-response",
                "id": id,
                "error": {"message": "boom"}
            }))
            .unwrap();

        match pending.wait().await {
            Err(BridgeError::Remote { id: got, message }) => {
                assert_eq!(got, id);
                assert_eq!(message, r#"{"message":"boom"}"#);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(!dispatcher.is_pending(id));
    }

    #[tokio::test]
    async fn test_unmatched_and_repeated_responses_are_dropped() {
        let (dispatcher, parent) = dispatcher_on("localhost");

        let first = dispatcher.issue("bloks", "getSpecInfo", json!({})).await.unwrap();
        parent.respond(ResponseEnvelope::success(7, json!("stray"))).unwrap();
        parent.respond(ResponseEnvelope::success(first.id(), json!(1))).unwrap();
        assert_eq!(first.wait().await.unwrap(), json!(1));

        parent.respond(ResponseEnvelope::success(0, json!(2))).unwrap();
        parent
            .deliver(json!({"event": "static-docs-bridge-response", "id": "zero"}))
            .unwrap();

        // Inbound traffic is ordered, so this settles after the strays.
        let second = dispatcher.issue("bloks", "getSpecInfo", json!({})).await.unwrap();
        assert_eq!(second.id(), 1);
        parent.respond(ResponseEnvelope::success(1, json!(3))).unwrap();
        assert_eq!(second.wait().await.unwrap(), json!(3));
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_unanswered_call_stays_pending() {
        let (dispatcher, _parent) = dispatcher_on("localhost");

        let pending = dispatcher.issue("feedback", "reportContentCopied", json!({})).await.unwrap();
        let id = pending.id();
        let mut waiting = tokio_test::task::spawn(pending.wait());

        assert_pending!(waiting.poll());
        tokio::task::yield_now().await;
        assert_pending!(waiting.poll());
        assert!(dispatcher.is_pending(id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_removes_entry() {
        let (frame, parent) = window_pair();
        let config = BridgeConfig::for_host("localhost").with_call_timeout(Duration::from_millis(100));
        let dispatcher = Dispatcher::from_frame(config, frame);

        let pending = dispatcher.issue("bloks", "getSpecInfo", json!({})).await.unwrap();
        let id = pending.id();
        match pending.wait().await {
            Err(BridgeError::Timeout { id: got, after }) => {
                assert_eq!(got, id);
                assert_eq!(after, Duration::from_millis(100));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(!dispatcher.is_pending(id));

        // A late reply is treated as unmatched.
        parent.respond(ResponseEnvelope::success(id, json!("late"))).unwrap();
        let next = dispatcher.issue("bloks", "getSpecInfo", json!({})).await.unwrap();
        parent.respond(ResponseEnvelope::success(next.id(), json!("on time"))).unwrap();
        assert_eq!(next.wait().await.unwrap(), json!("on time"));
    }

    #[tokio::test]
    async fn test_closed_port_leaves_no_entry() {
        let (dispatcher, parent) = dispatcher_on("localhost");
        drop(parent);

        let err = dispatcher.call("bloks", "getSpecInfo", json!({})).await.unwrap_err();
        assert!(matches!(err, BridgeError::Port(PortError::Closed)));
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_dropped_dispatcher_disconnects_pending_calls() {
        let (dispatcher, _parent) = dispatcher_on("localhost");

        let pending = dispatcher.issue("bloks", "getSpecInfo", json!({})).await.unwrap();
        let id = pending.id();
        drop(dispatcher);

        assert!(matches!(
            pending.wait().await,
            Err(BridgeError::Disconnected { id: got }) if got == id
        ));
    }

    #[tokio::test]
    async fn test_call_with_serializes_args() {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Copied<'a> {
            text_content: &'a str,
        }

        let (dispatcher, mut parent) = dispatcher_on("localhost");

        let host = tokio::spawn(async move {
            let posted = parent.next_posted().await.unwrap();
            let BridgeMessage::Call(call) = posted.message else {
                panic!("expected a call envelope");
            };
            parent
                .respond(ResponseEnvelope::success(call.id, call.args))
                .unwrap();
            parent
        });

        let echoed = dispatcher
            .call_with("feedback", "reportContentCopied", &Copied { text_content: "let x = 1;" })
            .await
            .unwrap();
        assert_eq!(echoed, json!({"textContent": "let x = 1;"}));
        host.await.unwrap();
    }
}
