//! PDF rendering of AI responses
//!
//! **Algorithm:**
//! 1. Skip unless the prompt has PDF generation enabled
//! 2. Clean the response (entities, script/style, paragraphs)
//! 3. Render the HTML template (unmatched placeholders kept)
//! 4. Render through the engine and validate the output size
//! 5. Derive a sanitized, collision-safe `.pdf` filename
//! 6. Write into the PDF directory and record the artifact on the submission
//!
//! Any failure yields a [`PdfError`] and leaves no artifact record.

use async_trait::async_trait;
use chrono::Utc;
use ffai_common::template::{self, Unmatched};
use ffai_common::{time, FormFields};
use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::html_cleaner;
pub use super::pdf_engine::{PageSettings, PdfEngine, PdfError};
use super::response_processor::{ResponseEvent, ResponseHook};
use crate::db::{prompts, submission_meta};
use crate::models::{FormRef, PdfArtifact, PromptDefinition};

/// Smallest output accepted as a real PDF
pub const MIN_PDF_BYTES: usize = 1024;

/// Largest output accepted
pub const MAX_PDF_BYTES: usize = 20 * 1024 * 1024;

static UNSAFE_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("filename pattern is valid"));
static REPEATED_DASHES: Lazy<Regex> = Lazy::new(|| Regex::new(r"-{2,}").expect("dash pattern is valid"));

pub struct PdfRenderer {
    db: SqlitePool,
    engine: Arc<dyn PdfEngine>,
    pdf_dir: PathBuf,
    base_url: String,
}

impl PdfRenderer {
    /// `base_url` is the public site URL; files are served under `{base_url}/pdfs/`
    pub fn new(db: SqlitePool, engine: Arc<dyn PdfEngine>, pdf_dir: PathBuf, base_url: &str) -> Self {
        Self {
            db,
            engine,
            pdf_dir,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn pdf_dir(&self) -> &Path {
        &self.pdf_dir
    }

    /// Generate a PDF for `prompt_id` if that prompt enables it
    ///
    /// **Returns:** Ok(None) when the prompt is missing or PDF generation is off
    pub async fn maybe_generate(
        &self,
        response: &str,
        prompt_id: i64,
        submission_id: i64,
        fields: &FormFields,
        form: &FormRef,
    ) -> Result<Option<PdfArtifact>, PdfError> {
        let prompt = prompts::load_prompt(&self.db, prompt_id)
            .await
            .map_err(|e| PdfError::Record(e.to_string()))?;

        match prompt {
            Some(prompt) => self.generate_for(&prompt, response, submission_id, fields, form).await,
            None => Ok(None),
        }
    }

    /// Same as [`maybe_generate`](Self::maybe_generate) with the definition in hand
    pub async fn generate_for(
        &self,
        prompt: &PromptDefinition,
        response: &str,
        submission_id: i64,
        fields: &FormFields,
        form: &FormRef,
    ) -> Result<Option<PdfArtifact>, PdfError> {
        if !prompt.pdf.enabled {
            return Ok(None);
        }

        let now = Utc::now();
        let html = render_document(prompt, response, submission_id, fields, form, now);

        let bytes = self.engine.render(&html, &PageSettings::from(&prompt.pdf)).await?;
        validate_size(bytes.len())?;

        let base = filename_base(&prompt.pdf.filename_template, prompt.id, submission_id, form.id, now);
        let filename = self.unique_filename(&base, submission_id).await?;
        let path = self.pdf_dir.join(&filename);

        tokio::fs::create_dir_all(&self.pdf_dir).await?;
        tokio::fs::write(&path, &bytes).await?;

        let artifact = PdfArtifact {
            url: format!("{}/pdfs/{}", self.base_url, filename),
            filename,
            path,
            size_bytes: bytes.len() as u64,
            generated_at: now,
        };

        if let Err(e) = submission_meta::record_pdf_artifact(&self.db, submission_id, &artifact).await {
            if let Err(remove_err) = tokio::fs::remove_file(&artifact.path).await {
                tracing::warn!(path = %artifact.path.display(), error = %remove_err, "Failed to remove unrecorded PDF");
            }
            return Err(PdfError::Record(e.to_string()));
        }

        tracing::info!(
            submission_id,
            prompt_id = prompt.id,
            filename = %artifact.filename,
            size_bytes = artifact.size_bytes,
            "PDF generated"
        );

        Ok(Some(artifact))
    }

    /// `{base}.pdf`, or `{base}-N.pdf` when that name belongs to another file
    ///
    /// A file that is this submission's recorded artifact is overwritten.
    async fn unique_filename(&self, base: &str, submission_id: i64) -> Result<String, PdfError> {
        let previous = submission_meta::recorded_pdf_filename(&self.db, submission_id)
            .await
            .map_err(|e| PdfError::Record(e.to_string()))?;

        let mut candidate = format!("{}.pdf", base);
        let mut n = 0u32;
        loop {
            let taken = tokio::fs::try_exists(self.pdf_dir.join(&candidate)).await?;
            if !taken || previous.as_deref() == Some(candidate.as_str()) {
                return Ok(candidate);
            }
            n += 1;
            candidate = format!("{}-{}.pdf", base, n);
        }
    }
}

#[async_trait]
impl ResponseHook for PdfRenderer {
    fn name(&self) -> &'static str {
        "pdf"
    }

    async fn on_response(&self, event: &ResponseEvent<'_>) {
        let result = self
            .generate_for(event.prompt, event.response, event.submission_id, event.fields, event.form)
            .await;

        if let Err(e) = result {
            tracing::error!(
                submission_id = event.submission_id,
                prompt_id = event.prompt.id,
                error = %e,
                "PDF generation failed"
            );
        }
    }
}

/// HTML document for one response
///
/// Submitted values are inserted HTML-escaped, lists comma-joined.
pub fn render_document(
    prompt: &PromptDefinition,
    response: &str,
    submission_id: i64,
    fields: &FormFields,
    form: &FormRef,
    at: chrono::DateTime<Utc>,
) -> String {
    let mut vars: BTreeMap<String, String> = fields
        .iter()
        .map(|(key, value)| (key.clone(), html_cleaner::escape_html(&value.as_text())))
        .collect();
    vars.insert("ai_response".to_string(), html_cleaner::clean_response(response));
    vars.insert("title".to_string(), prompt.pdf.title.clone());
    vars.insert("entry_id".to_string(), submission_id.to_string());
    vars.insert("form_id".to_string(), form.id.to_string());
    vars.insert("form_title".to_string(), form.title.clone());
    vars.insert("prompt_id".to_string(), prompt.id.to_string());
    vars.insert("date".to_string(), time::format_date(at));
    vars.insert("time".to_string(), time::format_time(at));

    template::render(prompt.pdf_template(), &vars, Unmatched::Keep)
}

fn validate_size(len: usize) -> Result<(), PdfError> {
    if len < MIN_PDF_BYTES {
        return Err(PdfError::TooSmall(len));
    }
    if len > MAX_PDF_BYTES {
        return Err(PdfError::Oversize(len));
    }
    Ok(())
}

/// Sanitized filename stem from the configured template
pub fn filename_base(
    filename_template: &str,
    prompt_id: i64,
    submission_id: i64,
    form_id: i64,
    at: chrono::DateTime<Utc>,
) -> String {
    let vars = [
        ("entry_id", submission_id.to_string()),
        ("form_id", form_id.to_string()),
        ("prompt_id", prompt_id.to_string()),
        ("date", time::format_date(at)),
        ("time", time::format_time_for_filename(at)),
    ];
    let rendered = template::render(filename_template, &vars[..], Unmatched::Erase);
    let stem = sanitize_filename(&rendered);

    if stem.is_empty() {
        format!("ai-response-{}", submission_id)
    } else {
        stem
    }
}

/// Restrict to `[A-Za-z0-9._-]`, collapse dashes, drop any `.pdf` suffix
pub fn sanitize_filename(name: &str) -> String {
    let replaced = UNSAFE_FILENAME_CHARS.replace_all(name.trim(), "-");
    let collapsed = REPEATED_DASHES.replace_all(&replaced, "-");
    let mut stem = collapsed.trim_matches(|c| c == '-' || c == '.').to_string();

    if stem.to_ascii_lowercase().ends_with(".pdf") {
        stem.truncate(stem.len() - 4);
        stem = stem.trim_end_matches(|c| c == '-' || c == '.').to_string();
    }
    stem
}
