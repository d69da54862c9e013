//! Shared HTTP API functionality
//!
//! Contains ONLY pure functions, database operations and shared types.
//! The service crate wraps these with its Axum handlers.

pub mod auth;
pub mod types;

pub use auth::{load_shared_secret, sign_storage_key, verify_token, TokenError};
pub use types::{DeferredTriggerRequest, ErrorResponse, DEFERRED_ACTION};
