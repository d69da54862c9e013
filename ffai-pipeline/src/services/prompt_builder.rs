//! Build AI prompts from submissions
//!
//! Two modes:
//! - **All fields**: every non-empty field as a `Label: value` line, in key
//!   order, labels from the form schema (raw key when unlabeled)
//! - **Template**: `{field_key}` substitution into the configured template;
//!   placeholders without a matching field are erased so field names never
//!   reach the provider

use ffai_common::template::{self, Unmatched};
use ffai_common::{fields, FormFields};
use thiserror::Error;

use crate::models::{FormRef, PromptDefinition, PromptMode};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromptError {
    #[error("Prompt {0} uses template mode but has no user prompt template")]
    MissingTemplate(i64),
}

/// Build the user prompt for `prompt`
pub fn build_user_prompt(
    prompt: &PromptDefinition,
    fields: &FormFields,
    form: &FormRef,
) -> Result<String, PromptError> {
    match prompt.prompt_mode {
        PromptMode::AllFields => Ok(all_fields_block(fields, form)),
        PromptMode::Template => {
            let template = prompt
                .user_prompt_template
                .as_deref()
                .filter(|t| !t.trim().is_empty())
                .ok_or(PromptError::MissingTemplate(prompt.id))?;
            Ok(render_template(template, fields))
        }
    }
}

/// Labeled plain-text block of every non-empty field
pub fn all_fields_block(fields: &FormFields, form: &FormRef) -> String {
    let mut out = String::new();
    for (key, value) in fields {
        if value.is_empty() {
            continue;
        }
        out.push_str(form.label_for(key));
        out.push_str(": ");
        out.push_str(&value.as_text());
        out.push('\n');
    }
    out.trim_end().to_string()
}

/// Template mode substitution (lists comma-joined, unmatched erased)
pub fn render_template(template_text: &str, fields: &FormFields) -> String {
    template::render(template_text, &fields::flatten(fields), Unmatched::Erase)
}

/// Complete prompt text recorded in the audit log
pub fn full_prompt(system_prompt: Option<&str>, user_prompt: &str) -> String {
    match system_prompt.filter(|s| !s.trim().is_empty()) {
        Some(system) => format!("{}\n\n{}", system, user_prompt),
        None => user_prompt.to_string(),
    }
}
