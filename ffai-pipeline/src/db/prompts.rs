//! Prompt definition persistence
//!
//! The full definition is stored as JSON; `form_id`, `title` and `enabled`
//! are duplicated into columns for lookups.

use chrono::Utc;
use ffai_common::{Error, Result};
use sqlx::{Row, SqlitePool};

use crate::models::PromptDefinition;

/// Insert (id == 0) or update a prompt definition, returning its id
pub async fn save_prompt(pool: &SqlitePool, prompt: &PromptDefinition) -> Result<i64> {
    let definition = serde_json::to_string(prompt)?;
    let now = Utc::now().to_rfc3339();

    if prompt.id == 0 {
        let result = sqlx::query(
            "INSERT INTO prompts (form_id, title, enabled, definition, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(prompt.form_id)
        .bind(&prompt.title)
        .bind(prompt.enabled)
        .bind(&definition)
        .bind(&now)
        .bind(&now)
        .execute(pool)
        .await?;

        return Ok(result.last_insert_rowid());
    }

    let result = sqlx::query(
        "UPDATE prompts SET form_id = ?, title = ?, enabled = ?, definition = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(prompt.form_id)
    .bind(&prompt.title)
    .bind(prompt.enabled)
    .bind(&definition)
    .bind(&now)
    .bind(prompt.id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("prompt {}", prompt.id)));
    }

    Ok(prompt.id)
}

/// Load one prompt definition
pub async fn load_prompt(pool: &SqlitePool, prompt_id: i64) -> Result<Option<PromptDefinition>> {
    let row = sqlx::query("SELECT id, definition FROM prompts WHERE id = ?")
        .bind(prompt_id)
        .fetch_optional(pool)
        .await?;

    row.map(|row| decode(row.get("id"), row.get("definition")))
        .transpose()
}

/// Enabled prompts bound to `form_id`, in id order
pub async fn prompts_for_form(pool: &SqlitePool, form_id: i64) -> Result<Vec<PromptDefinition>> {
    let rows = sqlx::query(
        "SELECT id, definition FROM prompts WHERE form_id = ? AND enabled = 1 ORDER BY id",
    )
    .bind(form_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| decode(row.get("id"), row.get("definition")))
        .collect()
}

/// All prompts, in id order
pub async fn list_prompts(pool: &SqlitePool) -> Result<Vec<PromptDefinition>> {
    let rows = sqlx::query("SELECT id, definition FROM prompts ORDER BY id")
        .fetch_all(pool)
        .await?;

    rows.into_iter()
        .map(|row| decode(row.get("id"), row.get("definition")))
        .collect()
}

/// Delete a prompt; returns false when it did not exist
pub async fn delete_prompt(pool: &SqlitePool, prompt_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM prompts WHERE id = ?")
        .bind(prompt_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn decode(id: i64, definition: String) -> Result<PromptDefinition> {
    let mut prompt: PromptDefinition = serde_json::from_str(&definition)
        .map_err(|e| Error::Internal(format!("Failed to deserialize prompt {}: {}", id, e)))?;
    prompt.id = id;
    Ok(prompt)
}
