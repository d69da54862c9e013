//! Processing outcomes written to the audit log

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Success,
    Error,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Success => "success",
            ProcessingStatus::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("success") {
            ProcessingStatus::Success
        } else {
            ProcessingStatus::Error
        }
    }
}

/// Token accounting reported by a provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: Option<u32>,
    #[serde(default)]
    pub completion_tokens: Option<u32>,
    #[serde(default)]
    pub total_tokens: Option<u32>,
}

/// Outcome of one processor run; never modified after creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub prompt_id: i64,
    pub submission_id: i64,
    pub form_id: i64,
    pub prompt_text: String,
    pub response_text: String,
    pub provider: String,
    pub model: String,
    /// Seconds spent waiting on the provider
    pub execution_time: f64,
    pub status: ProcessingStatus,
    pub error_message: Option<String>,
    pub token_usage: Option<TokenUsage>,
    pub created_at: DateTime<Utc>,
}

impl ProcessingResult {
    pub fn is_error(&self) -> bool {
        self.status == ProcessingStatus::Error
    }
}

/// Audit log row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggedResult {
    pub id: i64,
    #[serde(flatten)]
    pub result: ProcessingResult,
}
