//! System- and user-instruction composition.
//!
//! System instructions are markdown files embedded in the binary, keyed by
//! the metadata document's normalized source tag. Selection falls through to
//! the default instruction and finally to a hard-coded constant, so a
//! production build never depends on the file system and never runs without
//! a prompt. Every system instruction gets the shared response-format
//! instruction appended.

use std::fmt::Write as _;

use context::{AssetMetadata, ProductFacts, VisionHints};

use crate::DescribeRequest;

/// Source-specific system instructions, keyed by normalized source.
const SYSTEM_PROMPTS: &[(&str, &str)] = &[
    (
        "public_website",
        include_str!("../prompts/public_website_system_prompt.md"),
    ),
    (
        "product_catalog",
        include_str!("../prompts/product_catalog_system_prompt.md"),
    ),
];

const DEFAULT_SYSTEM_PROMPT: &str = include_str!("../prompts/default_system_prompt.md");
const RESPONSE_FORMAT: &str = include_str!("../prompts/_response_format.md");

/// Last-resort instruction when the embedded files are unusable.
const FALLBACK_SYSTEM_PROMPT: &str = "You write alt text for product images. Describe only what \
     is visible, lead with brand and model when provided, one sentence, at most 125 characters.";

const FALLBACK_RESPONSE_FORMAT: &str =
    "Return a single JSON object and nothing else: {\"alt_en\": \"<the alt text>\"}";

/// Lowercases the source tag and maps spaces/hyphens to underscores, the
/// spelling the prompt table is keyed by.
pub fn normalize_source(source: &str) -> String {
    source.trim().to_lowercase().replace([' ', '-'], "_")
}

/// Selects the system instruction for a source and appends the shared
/// response-format instruction.
pub fn system_prompt(source: Option<&str>) -> String {
    let selected = source
        .map(normalize_source)
        .and_then(|key| {
            SYSTEM_PROMPTS
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, text)| *text)
        })
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);
    let selected = non_empty_or(selected, FALLBACK_SYSTEM_PROMPT);
    let format = non_empty_or(RESPONSE_FORMAT, FALLBACK_RESPONSE_FORMAT);
    format!("{}\n\n{}", selected.trim_end(), format.trim_end())
}

fn non_empty_or<'a>(text: &'a str, fallback: &'a str) -> &'a str {
    if text.trim().is_empty() {
        fallback
    } else {
        text
    }
}

/// Composes the per-image user instruction: filename, metadata, curated
/// facts, visual hints, and the task sentence. Empty sections are omitted.
pub fn user_prompt(request: &DescribeRequest) -> String {
    let mut text = format!("Image filename: {}\n", request.blob_name);

    if let Some(section) = metadata_section(&request.metadata) {
        text.push('\n');
        text.push_str(&section);
    }
    if let Some(section) = facts_section(&request.facts) {
        text.push('\n');
        text.push_str(&section);
    }
    if let Some(section) = hints_section(&request.hints) {
        text.push('\n');
        text.push_str(&section);
    }

    text.push_str("\nTask: Write the alt text for this product image.\n");
    text
}

fn metadata_section(metadata: &AssetMetadata) -> Option<String> {
    if metadata.make.is_none() && metadata.model.is_none() {
        return None;
    }
    let mut section = String::from("Product Metadata:\n");
    if let Some(make) = &metadata.make {
        let _ = writeln!(section, "- Brand: {make}");
    }
    if let Some(model) = &metadata.model {
        let _ = writeln!(section, "- Model: {model}");
    }
    Some(section)
}

fn facts_section(facts: &ProductFacts) -> Option<String> {
    if facts.is_empty() {
        return None;
    }
    let mut section = String::from("Product Facts:\n");
    for (key, value) in facts {
        let _ = writeln!(section, "- {key}: {value}");
    }
    Some(section)
}

fn hints_section(hints: &VisionHints) -> Option<String> {
    if hints.angle.is_none() && hints.objects.is_empty() {
        return None;
    }
    let mut section = String::from("Visual Hints:\n");
    if let Some(angle) = hints.angle {
        let _ = writeln!(section, "- Angle: {}", angle.as_str());
    }
    if !hints.objects.is_empty() {
        let _ = writeln!(section, "- Objects: {}", hints.objects.join(", "));
    }
    Some(section)
}
