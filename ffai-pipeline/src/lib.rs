//! ffai-pipeline library interface
//!
//! Form submission → AI response pipeline: intake, deferred trigger,
//! provider calls, audit logging, PDF and email side effects.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod providers;
pub mod services;
pub mod startup;

pub use crate::error::{ApiError, ApiResult};

use axum::http::{header, HeaderValue};
use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::services::{DeferredTrigger, ResponseProcessor};

/// Most recent pipeline error, exposed by `/health`
pub type LastError = Arc<RwLock<Option<String>>>;

pub fn new_last_error() -> LastError {
    Arc::new(RwLock::new(None))
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub trigger: Arc<DeferredTrigger>,
    pub processor: Arc<ResponseProcessor>,
    /// Directory served under `/pdfs`
    pub pdf_dir: PathBuf,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    pub last_error: LastError,
}

impl AppState {
    pub fn new(db: SqlitePool, trigger: Arc<DeferredTrigger>, pdf_dir: PathBuf, last_error: LastError) -> Self {
        Self {
            db,
            processor: trigger.processor().clone(),
            trigger,
            pdf_dir,
            startup_time: Utc::now(),
            last_error,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let pdfs = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .service(ServeDir::new(&state.pdf_dir));

    Router::new()
        .merge(api::submission_routes())
        .merge(api::deferred_routes())
        .merge(api::prompt_routes())
        .merge(api::log_routes())
        .merge(api::settings_routes())
        .merge(api::health_routes())
        .nest_service("/pdfs", pdfs)
        .with_state(state)
}
