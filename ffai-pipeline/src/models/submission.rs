//! Submission events and snapshots

use chrono::{DateTime, Utc};
use ffai_common::FormFields;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Form identity plus field labels from the form schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormRef {
    pub id: i64,

    #[serde(default)]
    pub title: String,

    /// Field key → human label
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl FormRef {
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            labels: BTreeMap::new(),
        }
    }

    /// Label for `key`, falling back to the raw key
    pub fn label_for<'a>(&'a self, key: &'a str) -> &'a str {
        self.labels
            .get(key)
            .map(String::as_str)
            .filter(|label| !label.trim().is_empty())
            .unwrap_or(key)
    }
}

/// Submission event delivered by the form subsystem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionEvent {
    pub submission_id: i64,
    pub form: FormRef,
    #[serde(default)]
    pub fields: FormFields,
}

/// Prompt bound to a submitted form, and whether it runs as a background job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptRef {
    pub prompt_id: i64,
    pub background: bool,
}

/// Immutable capture of one submission at trigger time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionSnapshot {
    pub submission_id: i64,
    pub form_id: i64,
    pub form_title: String,
    pub labels: BTreeMap<String, String>,
    pub fields: FormFields,
    pub prompts: Vec<PromptRef>,
    pub created_at: DateTime<Utc>,
}

impl SubmissionSnapshot {
    pub fn capture(event: &SubmissionEvent, prompts: Vec<PromptRef>) -> Self {
        Self {
            submission_id: event.submission_id,
            form_id: event.form.id,
            form_title: event.form.title.clone(),
            labels: event.form.labels.clone(),
            fields: event.fields.clone(),
            prompts,
            created_at: Utc::now(),
        }
    }

    pub fn form_ref(&self) -> FormRef {
        FormRef {
            id: self.form_id,
            title: self.form_title.clone(),
            labels: self.labels.clone(),
        }
    }
}
