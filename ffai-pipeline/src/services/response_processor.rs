//! AI Response Processor
//!
//! Turns one (prompt definition, submission) pair into a recorded outcome and
//! optional side effects.
//!
//! **Algorithm:**
//! 1. Load the prompt definition and the active provider + model
//! 2. Build the user prompt (all fields or template)
//! 3. Call the provider, timing the call
//! 4. On error: record an error result, skip side effects, return false
//! 5. On success: fire response hooks (PDF), record the result when logging
//!    is enabled, send email when the response action asks for it
//!
//! Only the provider outcome decides the return value. Hook, logging and
//! email failures are logged and otherwise ignored.

use async_trait::async_trait;
use chrono::Utc;
use ffai_common::FormFields;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Instant;

use super::audit_log::AuditLog;
use super::email_dispatcher::EmailDispatcher;
use super::job_queue::{JobHandler, ScheduledJob};
use super::prompt_builder;
use crate::db::prompts;
use crate::models::{FormRef, ProcessingResult, ProcessingStatus, PromptDefinition, ResponseAction, TokenUsage};
use crate::providers::{CompletionRequest, ProviderRegistry, ProviderSettings};
use crate::LastError;

/// A successful AI response, as seen by response hooks
pub struct ResponseEvent<'a> {
    pub prompt: &'a PromptDefinition,
    pub submission_id: i64,
    pub fields: &'a FormFields,
    pub form: &'a FormRef,
    pub response: &'a str,
    pub provider: &'a str,
    pub model: &'a str,
}

/// Side effect run after every successful response
///
/// Hooks decide for themselves whether to act and must not fail the run.
#[async_trait]
pub trait ResponseHook: Send + Sync {
    fn name(&self) -> &'static str;

    async fn on_response(&self, event: &ResponseEvent<'_>);
}

pub struct ResponseProcessor {
    db: SqlitePool,
    providers: ProviderRegistry,
    audit: Arc<dyn AuditLog>,
    hooks: Vec<Arc<dyn ResponseHook>>,
    email: Option<Arc<EmailDispatcher>>,
    last_error: LastError,
}

impl ResponseProcessor {
    pub fn new(db: SqlitePool, providers: ProviderRegistry, audit: Arc<dyn AuditLog>, last_error: LastError) -> Self {
        Self {
            db,
            providers,
            audit,
            hooks: Vec::new(),
            email: None,
            last_error,
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn ResponseHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn with_email(mut self, email: Arc<EmailDispatcher>) -> Self {
        self.email = Some(email);
        self
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// Process one prompt for one submission
    ///
    /// **Returns:** true only when the provider produced a response
    pub async fn process(&self, prompt_id: i64, fields: &FormFields, submission_id: i64, form: &FormRef) -> bool {
        let prompt = match prompts::load_prompt(&self.db, prompt_id).await {
            Ok(Some(prompt)) if prompt.enabled => prompt,
            Ok(Some(_)) => {
                tracing::warn!(prompt_id, submission_id, "Prompt is disabled, skipping");
                return false;
            }
            Ok(None) => {
                tracing::warn!(prompt_id, submission_id, "Prompt definition not found, skipping");
                return false;
            }
            Err(e) => {
                self.note_error(format!("Loading prompt {} failed: {}", prompt_id, e)).await;
                return false;
            }
        };

        self.process_definition(&prompt, fields, submission_id, form).await
    }

    /// Process with the definition already loaded
    pub async fn process_definition(
        &self,
        prompt: &PromptDefinition,
        fields: &FormFields,
        submission_id: i64,
        form: &FormRef,
    ) -> bool {
        let settings = match ProviderSettings::load(&self.db).await {
            Ok(settings) => settings,
            Err(e) => {
                self.note_error(format!("Loading provider settings failed: {}", e)).await;
                return false;
            }
        };
        let provider_name = settings.kind.as_str();

        let user_prompt = match prompt_builder::build_user_prompt(prompt, fields, form) {
            Ok(text) => text,
            Err(e) => {
                self.note_error(e.to_string()).await;
                return false;
            }
        };
        let full_prompt = prompt_builder::full_prompt(prompt.system_prompt.as_deref(), &user_prompt);

        let mut result = ProcessingResult {
            prompt_id: prompt.id,
            submission_id,
            form_id: form.id,
            prompt_text: full_prompt,
            response_text: String::new(),
            provider: provider_name.to_string(),
            model: settings.model.clone(),
            execution_time: 0.0,
            status: ProcessingStatus::Error,
            error_message: None,
            token_usage: None,
            created_at: Utc::now(),
        };

        let Some(client) = self.providers.get(settings.kind) else {
            let message = format!("No API key configured for provider '{}'", provider_name);
            self.note_error(message.clone()).await;
            result.error_message = Some(message);
            self.record(&result).await;
            return false;
        };

        let request = CompletionRequest {
            system_prompt: prompt.system_prompt.clone(),
            user_prompt,
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
        };

        let started = Instant::now();
        let outcome = client.generate(&request).await;
        result.execution_time = started.elapsed().as_secs_f64();

        let reply = match outcome {
            Ok(reply) => reply,
            Err(e) => {
                self.note_error(format!(
                    "Provider {} failed for prompt {} (submission {}): {}",
                    provider_name, prompt.id, submission_id, e
                ))
                .await;
                result.error_message = Some(e.to_string());
                self.record(&result).await;
                return false;
            }
        };

        tracing::info!(
            prompt_id = prompt.id,
            submission_id,
            provider = provider_name,
            model = %settings.model,
            execution_time = result.execution_time,
            total_tokens = ?reply.usage.as_ref().and_then(|u: &TokenUsage| u.total_tokens),
            "AI response received"
        );

        result.status = ProcessingStatus::Success;
        result.response_text = reply.text;
        result.token_usage = reply.usage;

        let event = ResponseEvent {
            prompt,
            submission_id,
            fields,
            form,
            response: &result.response_text,
            provider: provider_name,
            model: &settings.model,
        };
        for hook in &self.hooks {
            tracing::debug!(hook = hook.name(), submission_id, "Running response hook");
            hook.on_response(&event).await;
        }

        if prompt.enable_logging {
            self.record(&result).await;
        }

        if prompt.response_action == ResponseAction::Email {
            match &self.email {
                Some(email) => {
                    let sent = email
                        .send_for(prompt, submission_id, fields, &result.response_text, provider_name)
                        .await;
                    if let Err(e) = sent {
                        self.note_error(format!(
                            "Email for prompt {} (submission {}) failed: {}",
                            prompt.id, submission_id, e
                        ))
                        .await;
                    }
                }
                None => tracing::warn!(prompt_id = prompt.id, "Email response action set but no dispatcher configured"),
            }
        }

        true
    }

    async fn record(&self, result: &ProcessingResult) {
        if let Err(e) = self.audit.record(result).await {
            self.note_error(format!("Audit log write failed: {}", e)).await;
        }
    }

    async fn note_error(&self, message: String) {
        tracing::error!("{}", message);
        *self.last_error.write().await = Some(message);
    }
}

#[async_trait]
impl JobHandler for ResponseProcessor {
    async fn run(&self, job: ScheduledJob) {
        let ok = self
            .process(job.prompt_id, &job.payload.fields, job.submission_id, &job.payload.form)
            .await;
        if !ok {
            tracing::warn!(
                prompt_id = job.prompt_id,
                submission_id = job.submission_id,
                "Background job finished without a response"
            );
        }
    }
}
