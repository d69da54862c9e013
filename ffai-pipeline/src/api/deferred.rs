//! Deferred-trigger wire endpoint
//!
//! Used by the loopback dispatcher and by external callers. Responses are
//! plain text; callers are not expected to read them.

use axum::{
    async_trait,
    extract::{FromRequest, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Form, Json, Router,
};
use ffai_common::api::DeferredTriggerRequest;

use crate::services::TriggerError;
use crate::AppState;

/// Body accepted as JSON or form-encoded
pub struct TriggerBody(pub DeferredTriggerRequest);

#[async_trait]
impl<S> FromRequest<S> for TriggerBody
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with("application/json"))
            .unwrap_or(false);

        if is_json {
            let Json(body) = Json::<DeferredTriggerRequest>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            Ok(TriggerBody(body))
        } else {
            let Form(body) = Form::<DeferredTriggerRequest>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            Ok(TriggerBody(body))
        }
    }
}

/// POST /api/deferred
///
/// **Responses:**
/// - 200 `ok`: snapshot claimed, processing started
/// - 400 `unknown action` / `missing key`
/// - 403 `invalid token`
/// - 404 `not found`: never stored, expired, or already consumed
///
/// The snapshot is claimed before responding; processing runs on its own
/// task so a disconnecting caller cannot cancel it.
pub async fn deferred_trigger(State(state): State<AppState>, TriggerBody(request): TriggerBody) -> (StatusCode, &'static str) {
    if !request.is_known_action() {
        return (StatusCode::BAD_REQUEST, "unknown action");
    }

    match state.trigger.claim(&request.signed_token, &request.storage_key).await {
        Ok(snapshot) => {
            let trigger = state.trigger.clone();
            let delay = request.delay;
            tokio::spawn(async move {
                let submission_id = snapshot.submission_id;
                let ack = trigger.run(snapshot, delay).await;
                tracing::info!(
                    submission_id,
                    processed_inline = ack.processed_inline,
                    scheduled = ack.scheduled,
                    failed = ack.failed,
                    "Deferred trigger processed"
                );
            });
            (StatusCode::OK, "ok")
        }
        Err(e) => {
            tracing::warn!(storage_key = %request.storage_key, error = %e, "Deferred trigger rejected");
            match e {
                TriggerError::MissingKey => (StatusCode::BAD_REQUEST, "missing key"),
                TriggerError::InvalidToken => (StatusCode::FORBIDDEN, "invalid token"),
                TriggerError::SnapshotNotFound(_) => (StatusCode::NOT_FOUND, "not found"),
                TriggerError::Corrupt(_) => (StatusCode::INTERNAL_SERVER_ERROR, "corrupt snapshot"),
            }
        }
    }
}

pub fn deferred_routes() -> Router<AppState> {
    Router::new().route("/api/deferred", post(deferred_trigger))
}
