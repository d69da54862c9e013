//! Database access for the pipeline service
//!
//! Tables: `settings` (shared), `prompts`, `ai_response_logs`,
//! `submission_meta`.

pub mod prompts;
pub mod response_logs;
pub mod settings;
pub mod submission_meta;

use ffai_common::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Open (or create) the database and ensure all service tables exist
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    let pool = ffai_common::db::init_database(db_path).await?;
    init_tables(&pool).await?;
    Ok(pool)
}

/// In-memory database with the full schema
pub async fn init_memory_pool() -> Result<SqlitePool> {
    let pool = ffai_common::db::init_memory_database().await?;
    init_tables(&pool).await?;
    Ok(pool)
}

/// Create service tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS prompts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            form_id INTEGER NOT NULL,
            title TEXT NOT NULL DEFAULT '',
            enabled INTEGER NOT NULL DEFAULT 1,
            definition TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_prompts_form ON prompts(form_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ai_response_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            prompt_id INTEGER NOT NULL,
            submission_id INTEGER NOT NULL,
            form_id INTEGER NOT NULL,
            prompt_text TEXT NOT NULL,
            response_text TEXT NOT NULL,
            provider TEXT NOT NULL,
            model TEXT NOT NULL,
            execution_time REAL NOT NULL,
            status TEXT NOT NULL,
            error_message TEXT,
            token_usage TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS submission_meta (
            submission_id INTEGER NOT NULL,
            meta_key TEXT NOT NULL,
            meta_value TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (submission_id, meta_key)
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (prompts, ai_response_logs, submission_meta)");

    Ok(())
}
