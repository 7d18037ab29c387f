//! Usage reporting.
//!
//! Reports are telemetry: every failure is logged and swallowed so a broken
//! side channel never interrupts the reader.

use docs_bridge_core::Dispatcher;
use serde::Serialize;

const MODULE: &str = "feedback";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ContentCopiedArgs<'a> {
    text_content: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FeatureUsageArgs<'a> {
    feature_name: &'a str,
    id: &'a str,
}

/// Report that the reader copied `text_content` from the page.
pub async fn report_content_copied(dispatcher: &Dispatcher, text_content: &str) {
    let args = ContentCopiedArgs { text_content };
    if let Err(e) = dispatcher.call_with(MODULE, "reportContentCopied", &args).await {
        tracing::debug!("Ignoring failed content-copied report: {e}");
    }
}

/// Report that the reader used `feature_name` on element `id`.
pub async fn report_feature_usage(dispatcher: &Dispatcher, feature_name: &str, id: &str) {
    tracing::info!(feature_name, id, "used feature");
    let args = FeatureUsageArgs { feature_name, id };
    if let Err(e) = dispatcher.call_with(MODULE, "reportFeatureUsage", &args).await {
        tracing::debug!("Ignoring failed feature-usage report: {e}");
    }
}
