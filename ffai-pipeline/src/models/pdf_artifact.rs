//! Generated PDF artifact record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Submission meta keys describing the artifact
pub const META_PDF_URL: &str = "pdf_url";
pub const META_PDF_FILENAME: &str = "pdf_filename";
pub const META_PDF_PATH: &str = "pdf_path";
pub const META_PDF_GENERATED_AT: &str = "pdf_generated_at";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfArtifact {
    pub filename: String,
    pub path: PathBuf,
    pub url: String,
    pub size_bytes: u64,
    pub generated_at: DateTime<Utc>,
}
