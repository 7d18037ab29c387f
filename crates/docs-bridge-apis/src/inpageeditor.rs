//! Diff submission from the in-page editor.

use docs_bridge_core::{BridgeError, Dispatcher};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

const MODULE: &str = "inpageeditor";

/// Edited file to be turned into a diff by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSubmission {
    pub file_path: String,
    pub new_content: String,
    pub project_name: String,
}

/// Diff submission error.
#[derive(Debug, Error)]
#[error("Error occurred while trying to submit diff: {source}")]
pub struct SubmitDiffError {
    #[from]
    source: BridgeError,
}

impl SubmitDiffError {
    /// Underlying bridge failure.
    #[must_use]
    pub const fn bridge_error(&self) -> &BridgeError {
        &self.source
    }
}

/// Ask the host to create a diff for `submission`.
///
/// # Errors
/// Returns error if the host cannot be reached or rejects the submission.
pub async fn submit_diff(
    dispatcher: &Dispatcher,
    submission: &DiffSubmission,
) -> Result<Value, SubmitDiffError> {
    Ok(dispatcher
        .call_with(MODULE, "createPhabricatorDiffApi", submission)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_host;
    use docs_bridge_core::ResponseEnvelope;
    use serde_json::json;

    fn submission() -> DiffSubmission {
        DiffSubmission {
            file_path: "docs/schema/migration.md".into(),
            new_content: "# Migration\n".into(),
            project_name: "glean".into(),
        }
    }

    #[tokio::test]
    async fn test_submit_diff() {
        let (dispatcher, host) =
            test_host::spawn(|call| ResponseEnvelope::success(call.id, json!({"diff": "D123"})));

        let created = submit_diff(&dispatcher, &submission()).await.unwrap();
        assert_eq!(created, json!({"diff": "D123"}));

        drop(dispatcher);
        let calls = host.await.unwrap();
        assert_eq!(calls[0].route(), "inpageeditor.createPhabricatorDiffApi");
        assert_eq!(
            calls[0].args,
            json!({
                "file_path": "docs/schema/migration.md",
                "new_content": "# Migration\n",
                "project_name": "glean"
            })
        );
    }

    #[tokio::test]
    async fn test_submit_diff_wraps_failure() {
        let (dispatcher, _host) =
            test_host::spawn(|call| ResponseEnvelope::failure(call.id, "not authorized"));

        let err = submit_diff(&dispatcher, &submission()).await.unwrap_err();
        assert!(err.to_string().starts_with("Error occurred while trying to submit diff"));
        assert!(err.to_string().contains("not authorized"));
        assert!(matches!(err.bridge_error(), BridgeError::Remote { .. }));
    }
}
