//! Provider key resolution tests
//!
//! Note: Uses serial_test to prevent ENV variable race conditions. Every test
//! that touches FFAI_*_API_KEY is marked with #[serial].

use ffai_common::config::{ProviderKeysConfig, TomlConfig};
use ffai_pipeline::config::{is_valid_key, resolve_all_provider_keys, resolve_provider_api_key, KeySource};
use ffai_pipeline::db::settings::set_provider_api_key;
use ffai_pipeline::providers::{ProviderKind, ProviderRegistry};
use serial_test::serial;

fn clear_env() {
    for kind in ProviderKind::ALL {
        std::env::remove_var(kind.env_var());
    }
}

fn toml_with_openai(key: Option<&str>) -> TomlConfig {
    TomlConfig {
        providers: ProviderKeysConfig {
            openai_api_key: key.map(str::to_string),
            ..ProviderKeysConfig::default()
        },
        ..TomlConfig::default()
    }
}

#[tokio::test]
#[serial]
async fn test_database_overrides_env_and_toml() {
    clear_env();
    let pool = ffai_pipeline::db::init_memory_pool().await.unwrap();
    set_provider_api_key(&pool, "openai", "db-key").await.unwrap();
    std::env::set_var("FFAI_OPENAI_API_KEY", "env-key");

    let resolved = resolve_provider_api_key(&pool, &toml_with_openai(Some("toml-key")), ProviderKind::OpenAi)
        .await
        .unwrap();
    assert_eq!(resolved, Some(("db-key".to_string(), KeySource::Database)));

    clear_env();
}

#[tokio::test]
#[serial]
async fn test_env_fallback_when_database_empty() {
    clear_env();
    let pool = ffai_pipeline::db::init_memory_pool().await.unwrap();
    std::env::set_var("FFAI_OPENAI_API_KEY", "env-key");

    let resolved = resolve_provider_api_key(&pool, &toml_with_openai(Some("toml-key")), ProviderKind::OpenAi)
        .await
        .unwrap();
    assert_eq!(resolved, Some(("env-key".to_string(), KeySource::Environment)));

    clear_env();
}

#[tokio::test]
#[serial]
async fn test_toml_fallback_and_whitespace_keys_ignored() {
    clear_env();
    let pool = ffai_pipeline::db::init_memory_pool().await.unwrap();
    set_provider_api_key(&pool, "openai", "   ").await.unwrap();
    std::env::set_var("FFAI_OPENAI_API_KEY", "");

    let resolved = resolve_provider_api_key(&pool, &toml_with_openai(Some("toml-key")), ProviderKind::OpenAi)
        .await
        .unwrap();
    assert_eq!(resolved, Some(("toml-key".to_string(), KeySource::Toml)));

    clear_env();
}

#[tokio::test]
#[serial]
async fn test_unconfigured_providers_are_skipped() {
    clear_env();
    let pool = ffai_pipeline::db::init_memory_pool().await.unwrap();
    std::env::set_var("FFAI_CLAUDE_API_KEY", "claude-key");

    let keys = resolve_all_provider_keys(&pool, &TomlConfig::default()).await.unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[&ProviderKind::Claude], "claude-key");

    let registry = ProviderRegistry::from_keys(keys).unwrap();
    assert_eq!(registry.configured(), vec![ProviderKind::Claude]);
    assert!(registry.get(ProviderKind::OpenAi).is_none());

    clear_env();
}

#[test]
fn test_key_validation() {
    assert!(is_valid_key("sk-123"));
    assert!(!is_valid_key(""));
    assert!(!is_valid_key(" \t\n"));
}
