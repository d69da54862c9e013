//! # FFAI Common Library
//!
//! Shared code for the form-to-AI pipeline:
//! - Error type shared by all crates
//! - Submission field model (scalar / list values)
//! - Placeholder template rendering
//! - Deferred-trigger token signing
//! - TOML bootstrap configuration and root folder resolution
//! - Settings table helpers

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod fields;
pub mod template;
pub mod time;

pub use error::{Error, Result};
pub use fields::{FieldValue, FormFields};
pub use template::Unmatched;
