//! Placeholder template rendering
//!
//! Replaces `{name}` placeholders with values from a lookup map. Rendering is
//! a single pass: text inserted for one placeholder is never scanned again,
//! so values containing `{...}` are inserted verbatim.
//!
//! Each call site chooses what happens to placeholders without a value:
//! prompt building erases them so field keys never leak into a prompt,
//! PDF and email rendering keep them intact.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::{BTreeMap, HashMap};

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{([A-Za-z0-9_.\-]+)\}").expect("placeholder pattern is valid")
});

/// Policy for placeholders that have no value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unmatched {
    /// Remove the placeholder from the output
    Erase,
    /// Leave the placeholder text as-is
    Keep,
}

/// Lookup of placeholder name → replacement text
pub trait Vars {
    fn lookup(&self, name: &str) -> Option<&str>;
}

impl Vars for HashMap<String, String> {
    fn lookup(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

impl Vars for BTreeMap<String, String> {
    fn lookup(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

impl Vars for [(&str, String)] {
    fn lookup(&self, name: &str) -> Option<&str> {
        self.iter().find(|(k, _)| *k == name).map(|(_, v)| v.as_str())
    }
}

/// Render `template`, substituting every `{name}` found in `vars`
pub fn render<V: Vars + ?Sized>(template: &str, vars: &V, unmatched: Unmatched) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| match vars.lookup(&caps[1]) {
            Some(value) => value.to_string(),
            None => match unmatched {
                Unmatched::Erase => String::new(),
                Unmatched::Keep => caps[0].to_string(),
            },
        })
        .into_owned()
}

/// Distinct placeholder names in order of first appearance
pub fn placeholders(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in PLACEHOLDER.captures_iter(template) {
        let name = &caps[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// True if any `{name}` placeholder remains in `text`
pub fn has_placeholders(text: &str) -> bool {
    PLACEHOLDER.is_match(text)
}
