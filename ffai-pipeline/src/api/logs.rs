//! Audit log listing

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::db::response_logs;
use crate::models::LoggedResult;
use crate::{ApiResult, AppState};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub prompt_id: Option<i64>,
    pub limit: Option<i64>,
}

/// GET /api/logs?prompt_id=&limit=
///
/// Newest first. `limit` defaults to 50, capped at 500.
pub async fn list_logs(State(state): State<AppState>, Query(query): Query<LogQuery>) -> ApiResult<Json<Vec<LoggedResult>>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let rows = response_logs::recent_results(&state.db, query.prompt_id, limit).await?;
    Ok(Json(rows))
}

pub fn log_routes() -> Router<AppState> {
    Router::new().route("/api/logs", get(list_logs))
}
