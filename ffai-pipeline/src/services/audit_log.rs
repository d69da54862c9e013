//! Audit log of processing results

use async_trait::async_trait;
use ffai_common::Result;
use sqlx::SqlitePool;

use crate::db::response_logs;
use crate::models::ProcessingResult;

#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Append `result`; returns the log entry id
    async fn record(&self, result: &ProcessingResult) -> Result<i64>;
}

/// Audit log backed by the `ai_response_logs` table
#[derive(Clone)]
pub struct SqliteAuditLog {
    db: SqlitePool,
}

impl SqliteAuditLog {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AuditLog for SqliteAuditLog {
    async fn record(&self, result: &ProcessingResult) -> Result<i64> {
        let id = response_logs::insert_result(&self.db, result).await?;
        tracing::debug!(
            log_id = id,
            prompt_id = result.prompt_id,
            submission_id = result.submission_id,
            status = result.status.as_str(),
            "Processing result logged"
        );
        Ok(id)
    }
}
