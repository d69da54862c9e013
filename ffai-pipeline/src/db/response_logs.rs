//! AI response audit log persistence

use ffai_common::{Error, Result};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use crate::models::{LoggedResult, ProcessingResult, ProcessingStatus, TokenUsage};

/// Append a processing result, returning the row id
pub async fn insert_result(pool: &SqlitePool, result: &ProcessingResult) -> Result<i64> {
    let token_usage = result
        .token_usage
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    let row = sqlx::query(
        r#"
        INSERT INTO ai_response_logs (
            prompt_id, submission_id, form_id, prompt_text, response_text,
            provider, model, execution_time, status, error_message,
            token_usage, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(result.prompt_id)
    .bind(result.submission_id)
    .bind(result.form_id)
    .bind(&result.prompt_text)
    .bind(&result.response_text)
    .bind(&result.provider)
    .bind(&result.model)
    .bind(result.execution_time)
    .bind(result.status.as_str())
    .bind(&result.error_message)
    .bind(&token_usage)
    .bind(result.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(row.last_insert_rowid())
}

/// Most recent results first, optionally filtered by prompt
pub async fn recent_results(
    pool: &SqlitePool,
    prompt_id: Option<i64>,
    limit: i64,
) -> Result<Vec<LoggedResult>> {
    let rows = match prompt_id {
        Some(prompt_id) => {
            sqlx::query("SELECT * FROM ai_response_logs WHERE prompt_id = ? ORDER BY id DESC LIMIT ?")
                .bind(prompt_id)
                .bind(limit)
                .fetch_all(pool)
                .await?
        }
        None => {
            sqlx::query("SELECT * FROM ai_response_logs ORDER BY id DESC LIMIT ?")
                .bind(limit)
                .fetch_all(pool)
                .await?
        }
    };

    rows.iter().map(decode_row).collect()
}

/// Results recorded for one submission, oldest first
pub async fn results_for_submission(pool: &SqlitePool, submission_id: i64) -> Result<Vec<LoggedResult>> {
    let rows = sqlx::query("SELECT * FROM ai_response_logs WHERE submission_id = ? ORDER BY id")
        .bind(submission_id)
        .fetch_all(pool)
        .await?;

    rows.iter().map(decode_row).collect()
}

fn decode_row(row: &SqliteRow) -> Result<LoggedResult> {
    let token_usage: Option<String> = row.get("token_usage");
    let token_usage: Option<TokenUsage> = token_usage
        .map(|json| serde_json::from_str(&json))
        .transpose()?;

    let status: String = row.get("status");
    let created_at: String = row.get("created_at");
    let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| Error::Internal(format!("Failed to parse created_at: {}", e)))?
        .with_timezone(&chrono::Utc);

    Ok(LoggedResult {
        id: row.get("id"),
        result: ProcessingResult {
            prompt_id: row.get("prompt_id"),
            submission_id: row.get("submission_id"),
            form_id: row.get("form_id"),
            prompt_text: row.get("prompt_text"),
            response_text: row.get("response_text"),
            provider: row.get("provider"),
            model: row.get("model"),
            execution_time: row.get("execution_time"),
            status: ProcessingStatus::parse(&status),
            error_message: row.get("error_message"),
            token_usage,
            created_at,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;
    use chrono::Utc;

    fn result(prompt_id: i64, status: ProcessingStatus) -> ProcessingResult {
        ProcessingResult {
            prompt_id,
            submission_id: 42,
            form_id: 3,
            prompt_text: "prompt".to_string(),
            response_text: "response".to_string(),
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            execution_time: 1.25,
            status,
            error_message: None,
            token_usage: Some(TokenUsage {
                prompt_tokens: Some(10),
                completion_tokens: Some(20),
                total_tokens: Some(30),
            }),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_read_back() {
        let pool = init_memory_pool().await.unwrap();
        let original = result(1, ProcessingStatus::Success);

        let id = insert_result(&pool, &original).await.unwrap();
        let rows = results_for_submission(&pool, 42).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, id);
        assert_eq!(rows[0].result.token_usage, original.token_usage);
        assert_eq!(rows[0].result.status, ProcessingStatus::Success);
    }

    #[tokio::test]
    async fn test_recent_results_filter_and_limit() {
        let pool = init_memory_pool().await.unwrap();
        insert_result(&pool, &result(1, ProcessingStatus::Success)).await.unwrap();
        insert_result(&pool, &result(2, ProcessingStatus::Error)).await.unwrap();
        insert_result(&pool, &result(2, ProcessingStatus::Success)).await.unwrap();

        let for_two = recent_results(&pool, Some(2), 10).await.unwrap();
        assert_eq!(for_two.len(), 2);
        assert_eq!(for_two[0].result.status, ProcessingStatus::Success, "newest first");

        let limited = recent_results(&pool, None, 1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }
}
