//! Response normalization.
//!
//! Chat models answer the same prompt as strict JSON one day and as fenced
//! markdown or free prose the next. This module extracts the `alt_en` field
//! from whatever came back, then enforces the output contract: leading
//! capital, terminal punctuation.
//!
//! Extraction strategies, first non-empty hit wins:
//!
//! 1. the whole answer parses as a JSON object with a non-empty `alt_en`
//! 2. a fenced code block (``` or ```json) parses that way
//! 3. the first `{...}` span containing `"alt_en"` parses that way
//! 4. any `{...}` span (dot matches newlines) parses that way
//! 5. prose fallback: strip heading/bold markers, take the first line longer
//!    than ten characters, truncated to 200 characters

use once_cell::sync::Lazy;
use regex::Regex;

const PROSE_MIN_CHARS: usize = 10;
const PROSE_MAX_CHARS: usize = 200;

static FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)```").expect("fenced-block pattern"));

static ALT_OBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\{[^{}]*"alt_en"[^{}]*\}"#).expect("alt-object pattern"));

static ANY_OBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.+\}").expect("any-object pattern"));

/// Extracts `alt_en` from a raw model answer and applies the punctuation
/// contract. Empty input stays empty.
pub fn extract_alt(raw: &str) -> String {
    let alt = alt_from_whole(raw)
        .or_else(|| alt_from_fence(raw))
        .or_else(|| alt_from_embedded_object(raw))
        .or_else(|| alt_from_any_object(raw))
        .or_else(|| alt_from_prose(raw))
        .unwrap_or_default();
    polish(&alt)
}

fn alt_from_whole(raw: &str) -> Option<String> {
    alt_field(raw.trim())
}

fn alt_from_fence(raw: &str) -> Option<String> {
    let caps = FENCED_BLOCK.captures(raw)?;
    alt_field(caps[1].trim())
}

fn alt_from_embedded_object(raw: &str) -> Option<String> {
    alt_field(ALT_OBJECT.find(raw)?.as_str())
}

fn alt_from_any_object(raw: &str) -> Option<String> {
    alt_field(ANY_OBJECT.find(raw)?.as_str())
}

/// Parses a candidate JSON object and pulls a non-empty `alt_en` out of it.
fn alt_field(candidate: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(candidate).ok()?;
    let alt = value.get("alt_en")?.as_str()?.trim();
    (!alt.is_empty()).then(|| alt.to_string())
}

fn alt_from_prose(raw: &str) -> Option<String> {
    for line in raw.lines() {
        let line = line
            .trim_start_matches('#')
            .trim()
            .trim_matches('*')
            .trim();
        if line.chars().count() > PROSE_MIN_CHARS {
            return Some(truncate_chars(line, PROSE_MAX_CHARS));
        }
    }
    None
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max).collect();
    truncated.push_str("...");
    truncated
}

/// Capitalizes the first character and appends a period when the text does
/// not already end in terminal punctuation.
pub fn polish(alt: &str) -> String {
    let trimmed = alt.trim();
    let mut chars = trimmed.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let mut polished: String = first.to_uppercase().collect();
    polished.push_str(chars.as_str());
    if !matches!(polished.chars().last(), Some('.') | Some('!') | Some('?')) {
        polished.push('.');
    }
    polished
}
