//! HTML helpers for rendered documents and email bodies
//!
//! Response cleaning runs in three steps:
//! 1. Decode HTML entities (a named subset plus decimal/hex numeric)
//! 2. Strip `<script>` and `<style>` blocks
//! 3. Wrap text without block-level markup into `<p>` paragraphs

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]{2,8});").expect("entity pattern is valid"));

static SCRIPT_OR_STYLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>")
        .expect("script/style pattern is valid")
});

static BLOCK_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<(p|div|h[1-6]|ul|ol|li|table|blockquote|pre|section|article|br)\b")
        .expect("block tag pattern is valid")
});

static BLANK_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n").expect("blank line pattern is valid"));

/// Clean an AI response for embedding in an HTML document
pub fn clean_response(text: &str) -> String {
    let text = text.replace("\r\n", "\n");
    let decoded = decode_entities(&text);
    let stripped = SCRIPT_OR_STYLE.replace_all(&decoded, "");
    wrap_paragraphs(stripped.trim())
}

/// Lossy UTF-8 decode that drops invalid sequences instead of substituting
pub fn force_utf8(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).replace('\u{FFFD}', "")
}

/// Decode HTML entities in one pass (`&amp;lt;` becomes `&lt;`)
///
/// Unknown named entities are left as-is.
pub fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &Captures| {
            let body = &caps[1];
            let decoded = if let Some(hex) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = body.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                named_entity(body)
            };
            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn named_entity(name: &str) -> Option<char> {
    Some(match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{00A0}',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "hellip" => '\u{2026}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201C}',
        "rdquo" => '\u{201D}',
        "copy" => '\u{00A9}',
        "reg" => '\u{00AE}',
        "trade" => '\u{2122}',
        "euro" => '\u{20AC}',
        "middot" => '\u{00B7}',
        "bull" => '\u{2022}',
        _ => return None,
    })
}

/// Wrap bare text into paragraphs
///
/// Text that already contains block-level markup is returned unchanged.
/// Otherwise blank lines separate paragraphs and single newlines become
/// `<br>`.
pub fn wrap_paragraphs(text: &str) -> String {
    if text.is_empty() || BLOCK_TAG.is_match(text) {
        return text.to_string();
    }

    BLANK_LINE
        .split(text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| format!("<p>{}</p>", p.replace('\n', "<br>\n")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Escape text for safe inclusion in HTML
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Escape, then turn newlines into `<br>`
pub fn escape_html_with_breaks(text: &str) -> String {
    escape_html(&text.replace("\r\n", "\n")).replace('\n', "<br>\n")
}
