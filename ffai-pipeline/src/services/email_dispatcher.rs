//! Email Dispatcher
//!
//! Resolves recipients for a prompt's email action and sends one message
//! per recipient.
//!
//! **Recipient order:**
//! 1. The submitter's address, when "send to submitter" is enabled and an
//!    email-like field holds a valid address
//! 2. Each valid address from the static recipient list
//! 3. The site administrator, only when nothing else resolved
//!
//! Duplicates are dropped case-insensitively, keeping the first spelling.

use chrono::Utc;
use ffai_common::template::{self, Unmatched};
use ffai_common::{time, FormFields};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;

use super::html_cleaner;
pub use super::mail_transport::{MailError, MailTransport, OutgoingMail};
use crate::db::{prompts, submission_meta};
use crate::models::{EmailSettings, PromptDefinition};

/// Field names treated as the submitter's email address
pub const EMAIL_FIELD_NAMES: [&str; 7] = [
    "email",
    "your_email",
    "user_email",
    "contact_email",
    "e-mail",
    "mail",
    "email_address",
];

/// Site identity used in templates and as the last-resort recipient
#[derive(Debug, Clone)]
pub struct SiteInfo {
    pub name: String,
    pub url: String,
    pub admin_email: String,
}

/// Per-recipient outcome of one dispatch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendReport {
    pub sent: Vec<String>,
    pub failed: Vec<String>,
}

pub struct EmailDispatcher {
    db: SqlitePool,
    transport: Arc<dyn MailTransport>,
    site: SiteInfo,
}

impl EmailDispatcher {
    pub fn new(db: SqlitePool, transport: Arc<dyn MailTransport>, site: SiteInfo) -> Self {
        Self { db, transport, site }
    }

    /// Send the response for `prompt_id` to its resolved recipients
    pub async fn send(
        &self,
        prompt_id: i64,
        submission_id: i64,
        fields: &FormFields,
        response: &str,
        provider: &str,
    ) -> Result<SendReport, MailError> {
        let prompt = prompts::load_prompt(&self.db, prompt_id)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?
            .ok_or(MailError::PromptNotFound(prompt_id))?;

        self.send_for(&prompt, submission_id, fields, response, provider).await
    }

    /// Same as [`send`](Self::send) with the definition in hand
    pub async fn send_for(
        &self,
        prompt: &PromptDefinition,
        submission_id: i64,
        fields: &FormFields,
        response: &str,
        provider: &str,
    ) -> Result<SendReport, MailError> {
        let recipients = resolve_recipients(&prompt.email, fields, &self.site.admin_email);
        if recipients.is_empty() {
            return Err(MailError::NoRecipients);
        }

        let now = Utc::now();
        let mut vars = vec![
            ("site_name", self.site.name.clone()),
            ("site_url", self.site.url.clone()),
            ("date", time::format_date(now)),
            ("time", time::format_time(now)),
            ("entry_id", submission_id.to_string()),
            ("provider", provider.to_string()),
            ("ai_response", response.to_string()),
        ];
        let subject = template::render(&prompt.email.subject, &vars[..], Unmatched::Keep);
        if let Some(last) = vars.last_mut() {
            last.1 = html_cleaner::escape_html_with_breaks(response);
        }
        let html_body = template::render(&prompt.email.body, &vars[..], Unmatched::Keep);

        let attachments = if prompt.email.attach_pdf {
            self.pdf_attachment(submission_id).await
        } else {
            Vec::new()
        };

        let mut report = SendReport::default();
        for to in recipients {
            let mail = OutgoingMail {
                to: to.clone(),
                subject: subject.clone(),
                html_body: html_body.clone(),
                headers: vec![("Content-Type".to_string(), "text/html; charset=UTF-8".to_string())],
                attachments: attachments.clone(),
            };
            match self.transport.send(&mail).await {
                Ok(()) => report.sent.push(to),
                Err(e) => {
                    tracing::warn!(submission_id, recipient = %to, error = %e, "Email send failed");
                    report.failed.push(to);
                }
            }
        }

        tracing::info!(
            submission_id,
            prompt_id = prompt.id,
            sent = report.sent.len(),
            failed = report.failed.len(),
            "Email dispatch finished"
        );

        if report.failed.is_empty() {
            Ok(report)
        } else {
            Err(MailError::PartialFailure {
                sent: report.sent.len(),
                failed: report.failed,
            })
        }
    }

    async fn pdf_attachment(&self, submission_id: i64) -> Vec<PathBuf> {
        match submission_meta::recorded_pdf_path(&self.db, submission_id).await {
            Ok(Some(path)) if path.is_file() => vec![path],
            Ok(_) => {
                tracing::debug!(submission_id, "No PDF recorded; sending without attachment");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(submission_id, error = %e, "Failed to look up PDF artifact");
                Vec::new()
            }
        }
    }
}

/// Resolve the recipient list for one dispatch
pub fn resolve_recipients(settings: &EmailSettings, fields: &FormFields, admin_email: &str) -> Vec<String> {
    let mut recipients: Vec<String> = Vec::new();

    if settings.send_to_submitter {
        let submitter = fields
            .iter()
            .filter(|(key, _)| is_email_field(key))
            .flat_map(|(_, value)| value.values())
            .map(str::trim)
            .find(|candidate| is_valid_email(candidate));
        match submitter {
            Some(address) => push_unique(&mut recipients, address),
            None => tracing::debug!("No submitter email field found"),
        }
    }

    for address in settings
        .additional_recipients
        .split([',', ';', '\n'])
        .map(str::trim)
        .filter(|a| !a.is_empty())
    {
        if is_valid_email(address) {
            push_unique(&mut recipients, address);
        } else {
            tracing::warn!(address, "Ignoring invalid additional recipient");
        }
    }

    if recipients.is_empty() && is_valid_email(admin_email.trim()) {
        recipients.push(admin_email.trim().to_string());
    }

    recipients
}

/// Known email field name, or any name containing "email"
pub fn is_email_field(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    EMAIL_FIELD_NAMES.contains(&lower.as_str()) || lower.contains("email")
}

/// One `@`, non-empty local part, dotted domain, no whitespace
pub fn is_valid_email(address: &str) -> bool {
    if address.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = address.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

fn push_unique(recipients: &mut Vec<String>, address: &str) {
    if !recipients.iter().any(|r| r.eq_ignore_ascii_case(address)) {
        recipients.push(address.to_string());
    }
}
