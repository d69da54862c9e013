//! AI text-generation providers
//!
//! Each provider is a thin reqwest client behind [`AiProvider`]. Request
//! bodies and response parsing are pure functions so they can be tested
//! without a network.

pub mod claude;
pub mod gemini;
pub mod openai;

use async_trait::async_trait;
use ffai_common::{Error, Result};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::db::settings as db_settings;
use crate::models::TokenUsage;
use crate::services::html_cleaner::force_utf8;

pub use claude::ClaudeClient;
pub use gemini::GeminiClient;
pub use openai::OpenAiClient;

/// HTTP timeout for provider calls
pub const PROVIDER_TIMEOUT: Duration = Duration::from_secs(120);

/// Provider call errors
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Provider returned an empty response")]
    EmptyResponse,

    #[error("Authentication failed: {0}")]
    Auth(String),
}

/// One completion request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: Option<String>,
    pub user_prompt: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Generated text plus token accounting when the provider reports it
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderReply {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Short provider name recorded in the audit log
    fn name(&self) -> &'static str;

    async fn generate(&self, request: &CompletionRequest) -> std::result::Result<ProviderReply, ProviderError>;
}

/// Supported providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    OpenAi,
    Gemini,
    Claude,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [ProviderKind::OpenAi, ProviderKind::Gemini, ProviderKind::Claude];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Claude => "claude",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => openai::DEFAULT_MODEL,
            ProviderKind::Gemini => gemini::DEFAULT_MODEL,
            ProviderKind::Claude => claude::DEFAULT_MODEL,
        }
    }

    /// Environment variable holding this provider's API key
    pub fn env_var(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "FFAI_OPENAI_API_KEY",
            ProviderKind::Gemini => "FFAI_GEMINI_API_KEY",
            ProviderKind::Claude => "FFAI_CLAUDE_API_KEY",
        }
    }

    /// Client for this provider using `api_key`
    pub fn client(&self, api_key: String) -> std::result::Result<Arc<dyn AiProvider>, ProviderError> {
        Ok(match self {
            ProviderKind::OpenAi => Arc::new(OpenAiClient::new(api_key)?),
            ProviderKind::Gemini => Arc::new(GeminiClient::new(api_key)?),
            ProviderKind::Claude => Arc::new(ClaudeClient::new(api_key)?),
        })
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "gemini" => Ok(ProviderKind::Gemini),
            "claude" | "anthropic" => Ok(ProviderKind::Claude),
            other => Err(Error::InvalidInput(format!("Unknown provider: {}", other))),
        }
    }
}

/// Active provider selection, read from the settings table per run
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl ProviderSettings {
    /// Load the active provider and its model
    ///
    /// **Default:** OpenAI with the provider's default model
    pub async fn load(db: &SqlitePool) -> Result<Self> {
        let kind = match db_settings::get_active_provider(db).await? {
            Some(name) => name.parse()?,
            None => ProviderKind::OpenAi,
        };

        let model = db_settings::get_provider_model(db, kind.as_str())
            .await?
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| kind.default_model().to_string());

        Ok(Self {
            kind,
            model,
            max_tokens: db_settings::get_max_tokens(db).await?,
            temperature: db_settings::get_temperature(db).await?,
        })
    }

    /// Persist the active provider and (optionally) its model
    pub async fn store(db: &SqlitePool, kind: ProviderKind, model: Option<&str>) -> Result<()> {
        db_settings::set_active_provider(db, kind.as_str()).await?;
        if let Some(model) = model.filter(|m| !m.trim().is_empty()) {
            db_settings::set_provider_model(db, kind.as_str(), model.trim()).await?;
        }
        Ok(())
    }
}

/// Provider clients available to the processor
///
/// A provider without a configured API key has no entry.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    clients: HashMap<ProviderKind, Arc<dyn AiProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build clients for every resolved key
    pub fn from_keys(keys: HashMap<ProviderKind, String>) -> Result<Self> {
        let mut registry = Self::new();
        for (kind, key) in keys {
            let client = kind
                .client(key)
                .map_err(|e| Error::Config(format!("Failed to build {} client: {}", kind, e)))?;
            registry.insert(kind, client);
        }
        Ok(registry)
    }

    pub fn insert(&mut self, kind: ProviderKind, client: Arc<dyn AiProvider>) {
        self.clients.insert(kind, client);
    }

    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn AiProvider>> {
        self.clients.get(&kind).cloned()
    }

    pub fn configured(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|kind| self.clients.contains_key(kind))
            .collect()
    }
}

pub(crate) fn http_client() -> std::result::Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(PROVIDER_TIMEOUT)
        .build()
        .map_err(|e| ProviderError::Network(e.to_string()))
}

/// Send a prepared request and decode the JSON body
///
/// Invalid UTF-8 in the body is dropped before decoding.
/// 401/403 map to [`ProviderError::Auth`]; other non-success statuses to
/// [`ProviderError::Api`].
pub(crate) async fn send_json<T>(request: reqwest::RequestBuilder) -> std::result::Result<T, ProviderError>
where
    T: serde::de::DeserializeOwned,
{
    let response = request
        .send()
        .await
        .map_err(|e| ProviderError::Network(e.to_string()))?;

    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ProviderError::Network(e.to_string()))?;
    let body = force_utf8(&bytes);

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(ProviderError::Auth(error_message(&body)));
    }
    if !status.is_success() {
        return Err(ProviderError::Api {
            status: status.as_u16(),
            message: error_message(&body),
        });
    }

    serde_json::from_str(&body).map_err(|e| ProviderError::Parse(e.to_string()))
}

/// Best-effort extraction of `error.message` from a provider error body
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.chars().take(500).collect())
}
