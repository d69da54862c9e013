//! Outgoing mail transport

use async_trait::async_trait;
use base64::Engine as _;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Mail transport failed: {0}")]
    Transport(String),

    #[error("Attachment unreadable: {0}")]
    Attachment(String),

    #[error("Prompt {0} not found")]
    PromptNotFound(i64),

    #[error("No valid recipients")]
    NoRecipients,

    #[error("Sending failed for {} of {} recipients: {}", failed.len(), failed.len() + sent, failed.join(", "))]
    PartialFailure { sent: usize, failed: Vec<String> },
}

/// One message to one recipient
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub headers: Vec<(String, String)>,
    pub attachments: Vec<PathBuf>,
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError>;
}

/// Transport posting JSON to an HTTP mail relay
pub struct HttpMailTransport {
    client: reqwest::Client,
    relay_url: String,
    from_address: String,
}

#[derive(Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
    headers: Vec<[&'a str; 2]>,
    attachments: Vec<RelayAttachment>,
}

#[derive(Serialize)]
struct RelayAttachment {
    filename: String,
    content_base64: String,
}

impl HttpMailTransport {
    pub fn new(relay_url: impl Into<String>, from_address: impl Into<String>) -> Result<Self, MailError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| MailError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            relay_url: relay_url.into(),
            from_address: from_address.into(),
        })
    }
}

#[async_trait]
impl MailTransport for HttpMailTransport {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        let mut attachments = Vec::with_capacity(mail.attachments.len());
        for path in &mail.attachments {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|e| MailError::Attachment(format!("{}: {}", path.display(), e)))?;
            attachments.push(RelayAttachment {
                filename: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "attachment.pdf".to_string()),
                content_base64: base64::engine::general_purpose::STANDARD.encode(bytes),
            });
        }

        let message = RelayMessage {
            from: &self.from_address,
            to: &mail.to,
            subject: &mail.subject,
            html: &mail.html_body,
            headers: mail.headers.iter().map(|(k, v)| [k.as_str(), v.as_str()]).collect(),
            attachments,
        };

        let response = self
            .client
            .post(&self.relay_url)
            .json(&message)
            .send()
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MailError::Transport(format!("relay returned {}", response.status())));
        }
        Ok(())
    }
}

/// Transport that only logs; used when no relay is configured
pub struct LogMailTransport;

#[async_trait]
impl MailTransport for LogMailTransport {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        tracing::info!(
            to = %mail.to,
            subject = %mail.subject,
            attachments = mail.attachments.len(),
            "Mail relay not configured; message logged instead of sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_failure_message() {
        let err = MailError::PartialFailure {
            sent: 1,
            failed: vec!["b@x.com".to_string()],
        };
        assert_eq!(err.to_string(), "Sending failed for 1 of 2 recipients: b@x.com");
    }
}
