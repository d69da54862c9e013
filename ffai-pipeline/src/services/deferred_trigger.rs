//! Deferred-Execution Trigger
//!
//! Moves processing out of the submission request:
//!
//! 1. [`on_submission_received`](DeferredTrigger::on_submission_received)
//!    snapshots the submission into the TTL store, signs the storage key and
//!    dispatches a trigger message
//! 2. [`on_deferred_trigger`](DeferredTrigger::on_deferred_trigger) verifies
//!    the token, takes (deletes) the snapshot, and runs or schedules every
//!    bound prompt
//!
//! A snapshot is consumed at most once. When dispatch fails, or a dispatched
//! trigger is handed back undelivered, the submission is processed inline
//! instead of being dropped.

use ffai_common::api::auth::{sign_storage_key, verify_token, TokenError};
use ffai_common::time;
use rand::Rng;
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::dispatcher::{Delivery, TriggerDispatcher, TriggerMessage};
use super::job_queue::{JobPayload, JobScheduler, ScheduledJob, PROCESS_PROMPT_JOB};
use super::response_processor::ResponseProcessor;
use super::snapshot_store::{SnapshotStore, StoreError};
use crate::db::prompts;
use crate::models::{PromptDefinition, PromptRef, SubmissionEvent, SubmissionSnapshot};

/// Upper bound on the pre-processing delay
pub const MAX_TRIGGER_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TriggerError {
    #[error("missing key")]
    MissingKey,

    #[error("invalid token")]
    InvalidToken,

    #[error("snapshot not found: {0}")]
    SnapshotNotFound(String),

    #[error("snapshot unreadable: {0}")]
    Corrupt(String),
}

/// What intake did with a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// No enabled prompts are bound to the form
    NoPrompts,
    /// Trigger handed to the dispatcher
    Dispatched,
    /// Dispatch failed; prompts were processed before returning
    ProcessedInline,
}

/// Per-prompt tally of one trigger run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TriggerAck {
    pub processed_inline: usize,
    pub scheduled: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct TriggerSettings {
    pub snapshot_ttl: Duration,
    /// Seconds workers wait before processing (best-effort flush heuristic)
    pub delay_secs: u64,
}

impl Default for TriggerSettings {
    fn default() -> Self {
        Self {
            snapshot_ttl: Duration::from_secs(300),
            delay_secs: 1,
        }
    }
}

pub struct DeferredTrigger {
    db: SqlitePool,
    store: Arc<SnapshotStore<String>>,
    shared_secret: i64,
    dispatcher: Arc<dyn TriggerDispatcher>,
    processor: Arc<ResponseProcessor>,
    scheduler: Option<Arc<dyn JobScheduler>>,
    settings: TriggerSettings,
}

impl DeferredTrigger {
    pub fn new(
        db: SqlitePool,
        store: Arc<SnapshotStore<String>>,
        shared_secret: i64,
        dispatcher: Arc<dyn TriggerDispatcher>,
        processor: Arc<ResponseProcessor>,
        settings: TriggerSettings,
    ) -> Self {
        Self {
            db,
            store,
            shared_secret,
            dispatcher,
            processor,
            scheduler: None,
            settings,
        }
    }

    pub fn with_scheduler(mut self, scheduler: Arc<dyn JobScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn store(&self) -> &Arc<SnapshotStore<String>> {
        &self.store
    }

    pub fn processor(&self) -> &Arc<ResponseProcessor> {
        &self.processor
    }

    /// Signed token for `storage_key`
    pub fn sign(&self, storage_key: &str) -> String {
        sign_storage_key(storage_key, self.shared_secret)
    }

    /// Snapshot the submission and dispatch a trigger for it
    pub async fn on_submission_received(&self, event: &SubmissionEvent) -> DispatchOutcome {
        let submission_id = event.submission_id;

        let prompt_refs: Vec<PromptRef> = match prompts::prompts_for_form(&self.db, event.form.id).await {
            Ok(defs) => defs.iter().map(PromptDefinition::prompt_ref).collect(),
            Err(e) => {
                tracing::error!(submission_id, form_id = event.form.id, error = %e, "Prompt lookup failed");
                return DispatchOutcome::NoPrompts;
            }
        };
        if prompt_refs.is_empty() {
            tracing::debug!(submission_id, form_id = event.form.id, "No prompts bound to form");
            return DispatchOutcome::NoPrompts;
        }

        let snapshot = SubmissionSnapshot::capture(event, prompt_refs);
        let storage_key = new_storage_key(submission_id);

        let serialized = match serde_json::to_string(&snapshot) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(submission_id, error = %e, "Snapshot serialization failed; processing inline");
                process_all(&self.processor, &snapshot).await;
                return DispatchOutcome::ProcessedInline;
            }
        };
        self.store
            .put(storage_key.clone(), serialized, self.settings.snapshot_ttl)
            .await;

        let message = TriggerMessage {
            token: self.sign(&storage_key),
            storage_key: storage_key.clone(),
            delay: self.settings.delay_secs,
        };

        match self.dispatcher.dispatch(message) {
            Ok(delivery) => {
                if let Delivery::InFlight(returned) = delivery {
                    self.watch_delivery(submission_id, returned);
                }
                tracing::info!(submission_id, storage_key = %storage_key, "Deferred trigger dispatched");
                DispatchOutcome::Dispatched
            }
            Err(e) => {
                tracing::warn!(submission_id, error = %e, "Dispatch failed; processing inline");
                take_and_process(&self.store, &self.processor, submission_id, &storage_key).await;
                DispatchOutcome::ProcessedInline
            }
        }
    }

    /// Process inline if the dispatcher hands the message back
    ///
    /// A dropped sender means the message was delivered.
    fn watch_delivery(&self, submission_id: i64, returned: tokio::sync::oneshot::Receiver<TriggerMessage>) {
        let store = self.store.clone();
        let processor = self.processor.clone();
        tokio::spawn(async move {
            let Ok(message) = returned.await else {
                return;
            };
            tracing::warn!(
                submission_id,
                storage_key = %message.storage_key,
                "Trigger undelivered; processing inline"
            );
            take_and_process(&store, &processor, submission_id, &message.storage_key).await;
        });
    }

    /// Verify, consume and process one trigger
    pub async fn on_deferred_trigger(&self, token: &str, storage_key: &str, delay: u64) -> Result<TriggerAck, TriggerError> {
        let snapshot = self.claim(token, storage_key).await?;
        Ok(self.run(snapshot, delay).await)
    }

    /// Verify the token and take the snapshot
    ///
    /// The token is checked before the store is touched, so a forged token
    /// never consumes a snapshot.
    pub async fn claim(&self, token: &str, storage_key: &str) -> Result<SubmissionSnapshot, TriggerError> {
        verify_token(token, storage_key, self.shared_secret).map_err(|e| match e {
            TokenError::MissingKey => TriggerError::MissingKey,
            _ => TriggerError::InvalidToken,
        })?;

        let json = self.store.take(storage_key).await.map_err(|e| match e {
            StoreError::NotFound(key) => TriggerError::SnapshotNotFound(key),
        })?;

        serde_json::from_str(&json).map_err(|e| TriggerError::Corrupt(e.to_string()))
    }

    /// Process a claimed snapshot after an optional delay
    ///
    /// The delay only makes it likelier that the submitter's response has
    /// been flushed; it guarantees nothing.
    pub async fn run(&self, snapshot: SubmissionSnapshot, delay: u64) -> TriggerAck {
        let delay = Duration::from_secs(delay).min(MAX_TRIGGER_DELAY);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let form = snapshot.form_ref();
        let mut ack = TriggerAck::default();

        for prompt_ref in &snapshot.prompts {
            if prompt_ref.background {
                if let Some(job_id) = self.schedule(&snapshot, prompt_ref.prompt_id).await {
                    tracing::info!(
                        submission_id = snapshot.submission_id,
                        prompt_id = prompt_ref.prompt_id,
                        job_id,
                        "Prompt scheduled as background job"
                    );
                    ack.scheduled += 1;
                    continue;
                }
            }

            if self
                .processor
                .process(prompt_ref.prompt_id, &snapshot.fields, snapshot.submission_id, &form)
                .await
            {
                ack.processed_inline += 1;
            } else {
                ack.failed += 1;
            }
        }

        ack
    }

    async fn schedule(&self, snapshot: &SubmissionSnapshot, prompt_id: i64) -> Option<u64> {
        let scheduler = self.scheduler.as_ref()?;

        let background = match prompts::load_prompt(&self.db, prompt_id).await {
            Ok(Some(prompt)) => prompt.background,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(prompt_id, error = %e, "Prompt lookup failed; running inline");
                return None;
            }
        };

        let job = ScheduledJob {
            job_type: PROCESS_PROMPT_JOB.to_string(),
            prompt_id,
            form_id: snapshot.form_id,
            submission_id: snapshot.submission_id,
            payload: JobPayload {
                fields: snapshot.fields.clone(),
                form: snapshot.form_ref(),
            },
            delay: Duration::from_secs(background.delay_seconds),
            priority: background.priority,
        };

        let job_id = scheduler.schedule(job).await;
        if job_id.is_none() {
            tracing::warn!(prompt_id, "Job scheduling unavailable; running inline");
        }
        job_id
    }
}

/// Take the snapshot stored under `storage_key` and process it inline
///
/// Losing the race to another consumer is not an error: that consumer
/// processes it.
async fn take_and_process(
    store: &SnapshotStore<String>,
    processor: &ResponseProcessor,
    submission_id: i64,
    storage_key: &str,
) -> Option<TriggerAck> {
    match store.take(storage_key).await {
        Ok(json) => match serde_json::from_str::<SubmissionSnapshot>(&json) {
            Ok(snapshot) => Some(process_all(processor, &snapshot).await),
            Err(e) => {
                tracing::error!(submission_id, error = %e, "Stored snapshot unreadable");
                None
            }
        },
        Err(StoreError::NotFound(_)) => {
            tracing::warn!(submission_id, "Snapshot already consumed before inline fallback");
            None
        }
    }
}

/// Process every prompt inline, ignoring background flags
async fn process_all(processor: &ResponseProcessor, snapshot: &SubmissionSnapshot) -> TriggerAck {
    let form = snapshot.form_ref();
    let mut ack = TriggerAck::default();
    for prompt_ref in &snapshot.prompts {
        if processor
            .process(prompt_ref.prompt_id, &snapshot.fields, snapshot.submission_id, &form)
            .await
        {
            ack.processed_inline += 1;
        } else {
            ack.failed += 1;
        }
    }
    ack
}

/// `ffai_snapshot_{submission_id}_{unix_millis}_{random}`
pub fn new_storage_key(submission_id: i64) -> String {
    let salt: u32 = rand::thread_rng().gen();
    format!("ffai_snapshot_{}_{}_{}", submission_id, time::unix_millis(), salt)
}
