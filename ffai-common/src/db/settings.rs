//! Generic settings accessors over the key/value `settings` table

use crate::{Error, Result};
use sqlx::SqlitePool;

/// Read a setting and parse it into `T`
///
/// **Returns:** Some(value) if set, None if missing
pub async fn get_setting<T>(db: &SqlitePool, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    match row {
        Some((value,)) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting '{}' failed: {}", key, e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Upsert a setting
pub async fn set_setting<T>(db: &SqlitePool, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_database;

    #[tokio::test]
    async fn test_get_missing_setting() {
        let pool = init_memory_database().await.unwrap();
        let value: Option<String> = get_setting(&pool, "nope").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_set_then_update() {
        let pool = init_memory_database().await.unwrap();

        set_setting(&pool, "worker_count", 2).await.unwrap();
        set_setting(&pool, "worker_count", 4).await.unwrap();

        let value: Option<usize> = get_setting(&pool, "worker_count").await.unwrap();
        assert_eq!(value, Some(4));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM settings WHERE key = 'worker_count'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1, "Should have exactly one entry after update");
    }

    #[tokio::test]
    async fn test_parse_failure_is_config_error() {
        let pool = init_memory_database().await.unwrap();
        set_setting(&pool, "worker_count", "many").await.unwrap();

        let result: Result<Option<usize>> = get_setting(&pool, "worker_count").await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
