//! WebSocket transport for host routers.

use std::{fmt, sync::Arc};

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use docs_bridge_core::{BridgeMessage, ResponseEnvelope};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

use crate::router::HostRouter;

/// WebSocket upgrade handler.
///
/// Use this as an Axum route handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(router): State<Arc<HostRouter>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, router))
}

async fn handle_socket(socket: WebSocket, router: Arc<HostRouter>) {
    let (sender, receiver) = socket.split();
    serve_frames(router, receiver, sender).await;
}

/// Answer call frames from `receiver` on `sender` until the peer closes.
async fn serve_frames<R, S, E>(router: Arc<HostRouter>, mut receiver: R, mut sender: S)
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
    S: Sink<Message> + Send + Unpin + 'static,
{
    // Responses may finish out of order; one task owns the sink.
    let (tx, mut rx) = mpsc::unbounded_channel::<ResponseEnvelope>();

    let send_task = tokio::spawn(async move {
        while let Some(response) = rx.recv().await {
            let json = match serde_json::to_string(&BridgeMessage::Response(response)) {
                Ok(j) => j,
                Err(e) => {
                    tracing::error!("Failed to serialize bridge response: {e}");
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = receiver.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text.to_string(),
            Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                Ok(s) => s,
                Err(_) => continue,
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::error!("WebSocket error: {e}");
                break;
            }
        };

        let router = Arc::clone(&router);
        let tx = tx.clone();
        tokio::spawn(async move {
            if let Some(response) = router.handle_text(&text).await {
                let _ = tx.send(response);
            }
        });
    }

    drop(tx);
    if let Err(e) = send_task.await {
        tracing::debug!("WebSocket send task ended abnormally: {e}");
    }
}

/// Create the bridge WebSocket router, served at `/bridge`.
///
/// # Example
/// ```ignore
/// let app = Router::new()
///     .merge(create_ws_router(Arc::new(host_router)));
/// ```
#[must_use]
pub fn create_ws_router(router: Arc<HostRouter>) -> axum::Router {
    axum::Router::new()
        .route("/bridge", axum::routing::get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(router)
}
