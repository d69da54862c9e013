//! Prompt definition management and manual re-processing

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use ffai_common::FormFields;
use serde::{Deserialize, Serialize};

use crate::db::prompts;
use crate::models::{FormRef, PromptDefinition};
use crate::{ApiError, ApiResult, AppState};

/// GET /api/prompts
pub async fn list_prompts(State(state): State<AppState>) -> ApiResult<Json<Vec<PromptDefinition>>> {
    Ok(Json(prompts::list_prompts(&state.db).await?))
}

/// POST /api/prompts
///
/// Creates when `id` is 0 or absent, otherwise updates.
pub async fn save_prompt(
    State(state): State<AppState>,
    Json(mut prompt): Json<PromptDefinition>,
) -> ApiResult<Json<PromptDefinition>> {
    if prompt.form_id <= 0 {
        return Err(ApiError::BadRequest("form_id must be positive".to_string()));
    }

    prompt.id = prompts::save_prompt(&state.db, &prompt).await?;
    tracing::info!(prompt_id = prompt.id, form_id = prompt.form_id, "Prompt saved");
    Ok(Json(prompt))
}

/// GET /api/prompts/:id
pub async fn get_prompt(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<PromptDefinition>> {
    prompts::load_prompt(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Prompt {}", id)))
}

/// DELETE /api/prompts/:id
pub async fn delete_prompt(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    if prompts::delete_prompt(&state.db, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Prompt {}", id)))
    }
}

#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    pub submission_id: i64,
    pub form: FormRef,
    #[serde(default)]
    pub fields: FormFields,
}

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub success: bool,
}

/// POST /api/prompts/:id/process
///
/// Operator re-invocation: runs the processor inline and reports whether a
/// response was produced.
pub async fn process_prompt(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<ProcessRequest>,
) -> Json<ProcessResponse> {
    tracing::info!(prompt_id = id, submission_id = request.submission_id, "Manual re-processing requested");
    let success = state
        .processor
        .process(id, &request.fields, request.submission_id, &request.form)
        .await;
    Json(ProcessResponse { success })
}

pub fn prompt_routes() -> Router<AppState> {
    Router::new()
        .route("/api/prompts", get(list_prompts).post(save_prompt))
        .route("/api/prompts/:id", get(get_prompt).delete(delete_prompt))
        .route("/api/prompts/:id/process", post(process_prompt))
}
