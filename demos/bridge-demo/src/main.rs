//! Bridge demo: an embedded page calling a host page.
//!
//! Run with: cargo run -p bridge-demo
//!
//! Or serve the host over WebSocket with: cargo run -p bridge-demo -- serve
//! and connect to ws://localhost:3000/bridge.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context as _;
use docs_bridge_apis::{
    Audience, ContentVariants, DiffSubmission, bloks, feedback, inpageeditor,
    uidocs::{self, ApiQuery, docsets},
};
use docs_bridge_core::{BridgeConfig, Dispatcher, window_pair};
use docs_bridge_host::{HandlerError, HostRouter, handler_fn, websocket::create_ws_router};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let router = Arc::new(demo_router());

    if std::env::args().nth(1).as_deref() == Some("serve") {
        return serve(router).await;
    }

    let config = BridgeConfig::from_env().unwrap_or_else(|e| {
        tracing::info!("{e}; defaulting to localhost");
        BridgeConfig::for_host("localhost")
    });

    let (frame, parent) = window_pair();
    let dispatcher = Dispatcher::from_frame(config, frame);
    let host = Arc::clone(&router).serve(parent);

    let spec = bloks::get_spec_info(&dispatcher, "primary-button").await?;
    tracing::info!("Spec info: {spec}");

    let api = uidocs::get_api(
        &dispatcher,
        &ApiQuery::new("Button", "bloks", docsets::BLOKS_CORE),
    )
    .await?;
    tracing::info!("API entry: {api}");

    feedback::report_feature_usage(&dispatcher, "copy-code", "example-1").await;
    feedback::report_content_copied(&dispatcher, "let x = 1;").await;

    let submission = DiffSubmission {
        file_path: "docs/getting-started.md".into(),
        new_content: "# Getting started\n".into(),
        project_name: "docs".into(),
    };
    match inpageeditor::submit_diff(&dispatcher, &submission).await {
        Ok(diff) => tracing::info!("Submitted diff: {diff}"),
        Err(e) => tracing::warn!("{e}"),
    }

    let banner = ContentVariants::both("Internal build", "Public build")
        .select(Audience::detect())?
        .unwrap_or_default();
    tracing::info!("{banner}; {} call(s) still pending", dispatcher.pending_count());

    drop(dispatcher);
    host.await.context("host task failed")?;
    Ok(())
}

async fn serve(router: Arc<HostRouter>) -> anyhow::Result<()> {
    let app = create_ws_router(router).layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    tracing::info!("Bridge host listening on ws://{addr}/bridge");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn demo_router() -> HostRouter {
    HostRouter::new()
        .route(
            "bloks",
            "getSpecInfo",
            handler_fn(|args: Value| async move {
                let style_id = args
                    .get("styleId")
                    .and_then(Value::as_str)
                    .ok_or_else(|| HandlerError::InvalidArgs("missing styleId".into()))?;
                Ok::<_, HandlerError>(json!({"styleId": style_id, "padding": 12, "radius": 6}))
            }),
        )
        .route(
            "uidocs",
            "getApi",
            handler_fn(|args: Value| async move {
                Ok::<_, HandlerError>(json!({"query": args, "props": ["label", "onPress"]}))
            }),
        )
        .route(
            "feedback",
            "reportFeatureUsage",
            handler_fn(|args: Value| async move {
                tracing::info!("Host recorded feature usage: {args}");
                Ok::<_, HandlerError>(Value::Null)
            }),
        )
        .route(
            "feedback",
            "reportContentCopied",
            handler_fn(|_| async { Err::<Value, _>(HandlerError::Failed("copy reporting disabled".into())) }),
        )
        .route(
            "inpageeditor",
            "createPhabricatorDiffApi",
            handler_fn(|args: Value| async move {
                let path = args
                    .get("file_path")
                    .and_then(Value::as_str)
                    .unwrap_or("<unknown>")
                    .to_string();
                Ok::<_, HandlerError>(json!({"diff": "D1", "file_path": path}))
            }),
        )
}
