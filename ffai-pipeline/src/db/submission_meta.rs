//! Per-submission meta attributes (generated artifact records)

use chrono::Utc;
use ffai_common::Result;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::models::pdf_artifact::{
    PdfArtifact, META_PDF_FILENAME, META_PDF_GENERATED_AT, META_PDF_PATH, META_PDF_URL,
};

/// Upsert one meta value
pub async fn set_meta(pool: &SqlitePool, submission_id: i64, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO submission_meta (submission_id, meta_key, meta_value, updated_at)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(submission_id, meta_key) DO UPDATE SET
            meta_value = excluded.meta_value,
            updated_at = excluded.updated_at",
    )
    .bind(submission_id)
    .bind(key)
    .bind(value)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Upsert several meta values atomically
pub async fn set_meta_many(pool: &SqlitePool, submission_id: i64, entries: &[(&str, String)]) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    let mut tx = pool.begin().await?;

    for (key, value) in entries {
        sqlx::query(
            "INSERT INTO submission_meta (submission_id, meta_key, meta_value, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(submission_id, meta_key) DO UPDATE SET
                meta_value = excluded.meta_value,
                updated_at = excluded.updated_at",
        )
        .bind(submission_id)
        .bind(*key)
        .bind(value)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

pub async fn get_meta(pool: &SqlitePool, submission_id: i64, key: &str) -> Result<Option<String>> {
    let value: Option<String> = sqlx::query_scalar(
        "SELECT meta_value FROM submission_meta WHERE submission_id = ? AND meta_key = ?",
    )
    .bind(submission_id)
    .bind(key)
    .fetch_optional(pool)
    .await?;

    Ok(value)
}

pub async fn all_meta(pool: &SqlitePool, submission_id: i64) -> Result<BTreeMap<String, String>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT meta_key, meta_value FROM submission_meta WHERE submission_id = ? ORDER BY meta_key",
    )
    .bind(submission_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().collect())
}

/// Record a generated PDF against its submission, replacing any earlier one
pub async fn record_pdf_artifact(pool: &SqlitePool, submission_id: i64, artifact: &PdfArtifact) -> Result<()> {
    set_meta_many(
        pool,
        submission_id,
        &[
            (META_PDF_URL, artifact.url.clone()),
            (META_PDF_FILENAME, artifact.filename.clone()),
            (META_PDF_PATH, artifact.path.display().to_string()),
            (META_PDF_GENERATED_AT, artifact.generated_at.to_rfc3339()),
        ],
    )
    .await
}

/// Filesystem path of the submission's recorded PDF, if any
pub async fn recorded_pdf_path(pool: &SqlitePool, submission_id: i64) -> Result<Option<PathBuf>> {
    Ok(get_meta(pool, submission_id, META_PDF_PATH).await?.map(PathBuf::from))
}

/// Filename of the submission's recorded PDF, if any
pub async fn recorded_pdf_filename(pool: &SqlitePool, submission_id: i64) -> Result<Option<String>> {
    get_meta(pool, submission_id, META_PDF_FILENAME).await
}
