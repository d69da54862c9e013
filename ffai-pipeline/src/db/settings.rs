//! Runtime settings stored in the shared `settings` table
//!
//! Keys: `active_provider`, `<provider>_model`, `<provider>_api_key`,
//! `ai_max_tokens`, `ai_temperature`.

use ffai_common::db::{get_setting, set_setting};
use ffai_common::Result;
use sqlx::SqlitePool;

/// Default completion length when unset
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Default sampling temperature when unset
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Name of the active provider (`openai`, `gemini`, `claude`)
///
/// **Returns:** Some(name) if set, None if not set
pub async fn get_active_provider(db: &SqlitePool) -> Result<Option<String>> {
    get_setting::<String>(db, "active_provider").await
}

pub async fn set_active_provider(db: &SqlitePool, provider: &str) -> Result<()> {
    set_setting(db, "active_provider", provider).await
}

/// Model configured for `provider`
pub async fn get_provider_model(db: &SqlitePool, provider: &str) -> Result<Option<String>> {
    get_setting::<String>(db, &format!("{}_model", provider)).await
}

pub async fn set_provider_model(db: &SqlitePool, provider: &str, model: &str) -> Result<()> {
    set_setting(db, &format!("{}_model", provider), model).await
}

/// API key stored for `provider` (database tier of key resolution)
pub async fn get_provider_api_key(db: &SqlitePool, provider: &str) -> Result<Option<String>> {
    get_setting::<String>(db, &format!("{}_api_key", provider)).await
}

pub async fn set_provider_api_key(db: &SqlitePool, provider: &str, key: &str) -> Result<()> {
    set_setting(db, &format!("{}_api_key", provider), key).await
}

/// Completion length limit
///
/// **Default:** 1000 tokens
pub async fn get_max_tokens(db: &SqlitePool) -> Result<u32> {
    get_setting(db, "ai_max_tokens")
        .await
        .map(|opt| opt.unwrap_or(DEFAULT_MAX_TOKENS))
}

/// Sampling temperature
///
/// **Default:** 0.7
pub async fn get_temperature(db: &SqlitePool) -> Result<f32> {
    get_setting(db, "ai_temperature")
        .await
        .map(|opt| opt.unwrap_or(DEFAULT_TEMPERATURE))
}
