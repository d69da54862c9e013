//! Prompt definitions
//!
//! Admin-configured settings describing how to turn a submission into an AI
//! request and what to do with the response. The processing side only reads
//! them.

use serde::{Deserialize, Serialize};

use super::PromptRef;

/// Default HTML template for generated PDFs
pub const DEFAULT_PDF_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>{title}</title></head>
<body>
<h1>{title}</h1>
<p class="meta">Submission #{entry_id} &middot; {form_title} &middot; {date} {time}</p>
<div class="response">{ai_response}</div>
</body>
</html>"#;

/// Default email subject
pub const DEFAULT_EMAIL_SUBJECT: &str = "AI Response for Submission #{entry_id}";

/// Default email body
pub const DEFAULT_EMAIL_BODY: &str = r#"<p>A new AI response was generated on {site_name} ({site_url}).</p>
<div>{ai_response}</div>
<p>Submission #{entry_id} &middot; {date} {time}</p>"#;

/// How the user prompt is produced from the submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptMode {
    /// Every submitted field as a labeled plain-text block
    #[default]
    AllFields,
    /// Placeholder substitution into `user_prompt_template`
    Template,
}

/// What to do with a successful response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseAction {
    #[default]
    None,
    Email,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageSize {
    #[default]
    A4,
    Letter,
    Legal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// Email response settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailSettings {
    /// Send to the email address found in the submission
    #[serde(default)]
    pub send_to_submitter: bool,

    /// Comma-separated static recipients
    #[serde(default)]
    pub additional_recipients: String,

    #[serde(default = "default_email_subject")]
    pub subject: String,

    #[serde(default = "default_email_body")]
    pub body: String,

    #[serde(default)]
    pub attach_pdf: bool,
}

/// PDF generation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_filename_template")]
    pub filename_template: String,

    /// HTML template; the built-in template is used when unset
    #[serde(default)]
    pub template_html: Option<String>,

    #[serde(default = "default_pdf_title")]
    pub title: String,

    #[serde(default)]
    pub page_size: PageSize,

    #[serde(default)]
    pub orientation: Orientation,

    #[serde(default = "default_margin_mm")]
    pub margin_mm: u32,
}

/// Deferred processing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundSettings {
    /// Hand the prompt to the job queue instead of running it inline
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub delay_seconds: u64,

    /// Lower runs first
    #[serde(default = "default_priority")]
    pub priority: i32,
}

/// One configured prompt bound to a form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Assigned by the store
    #[serde(default)]
    pub id: i64,

    pub form_id: i64,

    #[serde(default)]
    pub title: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub system_prompt: Option<String>,

    #[serde(default)]
    pub prompt_mode: PromptMode,

    #[serde(default)]
    pub user_prompt_template: Option<String>,

    #[serde(default)]
    pub response_action: ResponseAction,

    #[serde(default)]
    pub enable_logging: bool,

    #[serde(default)]
    pub email: EmailSettings,

    #[serde(default)]
    pub pdf: PdfSettings,

    #[serde(default)]
    pub background: BackgroundSettings,
}

impl PromptDefinition {
    /// Minimal enabled definition for `form_id` in all-fields mode
    pub fn new(form_id: i64, title: impl Into<String>) -> Self {
        Self {
            id: 0,
            form_id,
            title: title.into(),
            enabled: true,
            system_prompt: None,
            prompt_mode: PromptMode::AllFields,
            user_prompt_template: None,
            response_action: ResponseAction::None,
            enable_logging: false,
            email: EmailSettings::default(),
            pdf: PdfSettings::default(),
            background: BackgroundSettings::default(),
        }
    }

    pub fn prompt_ref(&self) -> PromptRef {
        PromptRef {
            prompt_id: self.id,
            background: self.background.enabled,
        }
    }

    pub fn pdf_template(&self) -> &str {
        self.pdf.template_html.as_deref().unwrap_or(DEFAULT_PDF_TEMPLATE)
    }
}

fn default_true() -> bool {
    true
}

fn default_email_subject() -> String {
    DEFAULT_EMAIL_SUBJECT.to_string()
}

fn default_email_body() -> String {
    DEFAULT_EMAIL_BODY.to_string()
}

fn default_filename_template() -> String {
    "ai-response-{entry_id}".to_string()
}

fn default_pdf_title() -> String {
    "AI Response".to_string()
}

fn default_margin_mm() -> u32 {
    15
}

fn default_priority() -> i32 {
    10
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            send_to_submitter: false,
            additional_recipients: String::new(),
            subject: default_email_subject(),
            body: default_email_body(),
            attach_pdf: false,
        }
    }
}

impl Default for PdfSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            filename_template: default_filename_template(),
            template_html: None,
            title: default_pdf_title(),
            page_size: PageSize::default(),
            orientation: Orientation::default(),
            margin_mm: default_margin_mm(),
        }
    }
}

impl Default for BackgroundSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            delay_seconds: 0,
            priority: default_priority(),
        }
    }
}
