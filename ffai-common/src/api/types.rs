//! Wire types shared between the intake side and the deferred-trigger endpoint

use serde::{Deserialize, Serialize};

/// Action name the deferred-trigger endpoint accepts
pub const DEFERRED_ACTION: &str = "ffai_process_deferred";

/// Body of the deferred-trigger wire call
///
/// Accepted form-encoded or as JSON.
///
/// # Examples
///
/// ```
/// use ffai_common::api::types::{DeferredTriggerRequest, DEFERRED_ACTION};
///
/// let request = DeferredTriggerRequest {
///     action: DEFERRED_ACTION.to_string(),
///     storage_key: "ffai_snapshot_42_1730000000000_7".to_string(),
///     signed_token: "abc123...".to_string(),
///     delay: 1,
/// };
/// assert!(request.is_known_action());
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeferredTriggerRequest {
    #[serde(default)]
    pub action: String,

    #[serde(default)]
    pub storage_key: String,

    #[serde(default)]
    pub signed_token: String,

    /// Seconds to wait before processing
    #[serde(default)]
    pub delay: u64,
}

impl DeferredTriggerRequest {
    pub fn is_known_action(&self) -> bool {
        self.action == DEFERRED_ACTION
    }
}

/// Error response envelope
///
/// Serialized as `{"error": {"code": "...", "message": "..."}}`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
        }
    }
}
