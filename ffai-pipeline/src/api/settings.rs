//! Provider settings endpoint

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::providers::{ProviderKind, ProviderSettings};
use crate::{ApiError, ApiResult, AppState};

/// Request payload for selecting the active provider
#[derive(Debug, Deserialize)]
pub struct SetProviderRequest {
    /// `openai`, `gemini` or `claude`
    pub provider: String,
    /// Model name; the provider's current/default model is kept when absent
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProviderSettingsResponse {
    pub provider: String,
    pub model: String,
    /// False when no API key is configured for the provider
    pub configured: bool,
}

/// POST /api/settings/provider
///
/// **Request:** `{"provider": "gemini", "model": "gemini-1.5-pro"}`
///
/// **Errors:**
/// - 400 Bad Request: unknown provider
pub async fn set_provider(
    State(state): State<AppState>,
    Json(payload): Json<SetProviderRequest>,
) -> ApiResult<Json<ProviderSettingsResponse>> {
    let kind: ProviderKind = payload
        .provider
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Unknown provider: {}", payload.provider)))?;

    ProviderSettings::store(&state.db, kind, payload.model.as_deref()).await?;
    let settings = ProviderSettings::load(&state.db).await?;

    let configured = state.processor.providers().get(kind).is_some();
    if !configured {
        tracing::warn!(provider = %kind, "Active provider has no API key; processing will fail until one is configured");
    }
    tracing::info!(provider = %kind, model = %settings.model, "Active provider updated");

    Ok(Json(ProviderSettingsResponse {
        provider: kind.to_string(),
        model: settings.model,
        configured,
    }))
}

pub fn settings_routes() -> Router<AppState> {
    Router::new().route("/api/settings/provider", post(set_provider))
}
