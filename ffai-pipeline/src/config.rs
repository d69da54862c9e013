//! Provider API key resolution
//!
//! Keys resolve with Database → ENV → TOML priority. A provider with no key
//! in any tier is simply left unconfigured.

use ffai_common::config::TomlConfig;
use ffai_common::Result;
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::{info, warn};

use crate::providers::ProviderKind;

/// Where a resolved key came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Database,
    Environment,
    Toml,
}

impl KeySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeySource::Database => "database",
            KeySource::Environment => "environment",
            KeySource::Toml => "TOML",
        }
    }
}

/// Resolve the API key for one provider
///
/// **Priority:** Database → ENV → TOML
///
/// **Returns:** Some((key, source)) if any tier holds a valid key
pub async fn resolve_provider_api_key(
    db: &SqlitePool,
    toml_config: &TomlConfig,
    kind: ProviderKind,
) -> Result<Option<(String, KeySource)>> {
    let db_key = crate::db::settings::get_provider_api_key(db, kind.as_str())
        .await?
        .filter(|k| is_valid_key(k));
    let env_key = std::env::var(kind.env_var()).ok().filter(|k| is_valid_key(k));
    let toml_key = toml_key(toml_config, kind).filter(|k| is_valid_key(k));

    let sources: Vec<&str> = [
        db_key.as_ref().map(|_| KeySource::Database),
        env_key.as_ref().map(|_| KeySource::Environment),
        toml_key.as_ref().map(|_| KeySource::Toml),
    ]
    .into_iter()
    .flatten()
    .map(|s| s.as_str())
    .collect();

    if sources.len() > 1 {
        warn!(
            provider = %kind,
            "API key found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    let resolved = db_key
        .map(|k| (k, KeySource::Database))
        .or_else(|| env_key.map(|k| (k, KeySource::Environment)))
        .or_else(|| toml_key.map(|k| (k, KeySource::Toml)));

    if let Some((_, source)) = &resolved {
        info!(provider = %kind, "API key loaded from {}", source.as_str());
    }

    Ok(resolved)
}

/// Resolve keys for every provider, skipping unconfigured ones
pub async fn resolve_all_provider_keys(
    db: &SqlitePool,
    toml_config: &TomlConfig,
) -> Result<HashMap<ProviderKind, String>> {
    let mut keys = HashMap::new();
    for kind in ProviderKind::ALL {
        match resolve_provider_api_key(db, toml_config, kind).await? {
            Some((key, _)) => {
                keys.insert(kind, key);
            }
            None => warn!(
                provider = %kind,
                "No API key configured (set {} or providers.{}_api_key in TOML)",
                kind.env_var(),
                kind.as_str()
            ),
        }
    }
    Ok(keys)
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

fn toml_key(config: &TomlConfig, kind: ProviderKind) -> Option<String> {
    match kind {
        ProviderKind::OpenAi => config.providers.openai_api_key.clone(),
        ProviderKind::Gemini => config.providers.gemini_api_key.clone(),
        ProviderKind::Claude => config.providers.claude_api_key.clone(),
    }
}
