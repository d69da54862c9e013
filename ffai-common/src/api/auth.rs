//! Deferred-trigger token signing
//!
//! A deferred trigger carries the snapshot storage key plus a token proving
//! the trigger was issued by this service. The token is a SHA-256 hash over
//! the storage key and a shared secret kept in the settings table.
//!
//! # Algorithm
//!
//! 1. Concatenate `"{storage_key}:{shared_secret}"`
//! 2. SHA-256 the bytes
//! 3. Render as 64 lowercase hex characters
//!
//! Verification recomputes the token and compares in constant time.

use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

/// Settings key holding the trigger shared secret
pub const SHARED_SECRET_KEY: &str = "trigger_shared_secret";

// ========================================
// Error Types
// ========================================

/// Token validation error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Storage key missing or empty
    MissingKey,

    /// Token missing or empty
    MissingToken,

    /// Token does not match the storage key
    InvalidToken,

    /// Database error loading shared secret
    DatabaseError(String),
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::MissingKey => write!(f, "Missing storage key"),
            TokenError::MissingToken => write!(f, "Missing token"),
            TokenError::InvalidToken => write!(f, "Invalid token"),
            TokenError::DatabaseError(err) => write!(f, "Database error: {}", err),
        }
    }
}

impl std::error::Error for TokenError {}

// ========================================
// Shared Secret Management
// ========================================

/// Load shared secret from database settings
///
/// Generates and stores a new secret on first use.
pub async fn load_shared_secret(db: &SqlitePool) -> Result<i64, TokenError> {
    let result: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(SHARED_SECRET_KEY)
        .fetch_optional(db)
        .await
        .map_err(|e| TokenError::DatabaseError(e.to_string()))?;

    match result {
        Some((value,)) => value
            .parse::<i64>()
            .map_err(|e| TokenError::DatabaseError(format!("Invalid i64: {}", e))),
        None => initialize_shared_secret(db).await,
    }
}

/// Generate and persist a new random non-zero shared secret
pub async fn initialize_shared_secret(db: &SqlitePool) -> Result<i64, TokenError> {
    use rand::Rng;

    let mut rng = rand::thread_rng();
    let secret: i64 = loop {
        let val = rng.gen::<i64>();
        if val != 0 {
            break val;
        }
    };

    sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)")
        .bind(SHARED_SECRET_KEY)
        .bind(secret.to_string())
        .execute(db)
        .await
        .map_err(|e| TokenError::DatabaseError(e.to_string()))?;

    tracing::info!("Initialized deferred-trigger shared secret");

    Ok(secret)
}

// ========================================
// Signing and Verification
// ========================================

/// Compute the token for a storage key
///
/// # Examples
///
/// ```
/// use ffai_common::api::auth::sign_storage_key;
///
/// let token = sign_storage_key("ffai_snapshot_42_1730000000000_7", 123456789);
/// assert_eq!(token.len(), 64);
/// ```
pub fn sign_storage_key(storage_key: &str, shared_secret: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(storage_key.as_bytes());
    hasher.update(b":");
    hasher.update(shared_secret.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Verify a token against a storage key
///
/// # Examples
///
/// ```
/// use ffai_common::api::auth::{sign_storage_key, verify_token};
///
/// let token = sign_storage_key("key", 42);
/// assert!(verify_token(&token, "key", 42).is_ok());
/// assert!(verify_token(&token, "other-key", 42).is_err());
/// ```
pub fn verify_token(provided: &str, storage_key: &str, shared_secret: i64) -> Result<(), TokenError> {
    if storage_key.trim().is_empty() {
        return Err(TokenError::MissingKey);
    }
    if provided.trim().is_empty() {
        return Err(TokenError::MissingToken);
    }

    let expected = sign_storage_key(storage_key, shared_secret);
    if constant_time_eq(provided.as_bytes(), expected.as_bytes()) {
        Ok(())
    } else {
        Err(TokenError::InvalidToken)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// ========================================
// Tests
// ========================================
