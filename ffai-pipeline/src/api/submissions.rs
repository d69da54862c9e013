//! Submission intake and per-submission meta

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::db::submission_meta;
use crate::models::SubmissionEvent;
use crate::{ApiResult, AppState};

/// POST /api/submissions
///
/// **Request:** `{"submission_id": 42, "form": {...}, "fields": {...}}`
/// **Response:** always 202 `{"status": "accepted"}`
///
/// Pipeline failures never reach the submitter; they are logged.
pub async fn receive_submission(
    State(state): State<AppState>,
    Json(event): Json<SubmissionEvent>,
) -> (StatusCode, Json<Value>) {
    let outcome = state.trigger.on_submission_received(&event).await;
    tracing::debug!(submission_id = event.submission_id, ?outcome, "Submission received");

    (StatusCode::ACCEPTED, Json(json!({"status": "accepted"})))
}

/// GET /api/submissions/:id/meta
pub async fn get_submission_meta(
    State(state): State<AppState>,
    Path(submission_id): Path<i64>,
) -> ApiResult<Json<BTreeMap<String, String>>> {
    let meta = submission_meta::all_meta(&state.db, submission_id).await?;
    Ok(Json(meta))
}

pub fn submission_routes() -> Router<AppState> {
    Router::new()
        .route("/api/submissions", post(receive_submission))
        .route("/api/submissions/:id/meta", get(get_submission_meta))
}
