//! Product-fact distillation.
//!
//! The free-form `description` field of a metadata document mixes usable
//! specifications (`Print speed: 15 ppm`) with promotional copy that must not
//! reach the describer prompt. [`distill`] walks the description line by
//! line, drops anything matching the promotional pattern set, and keeps short
//! `Key: value` pairs under normalized keys.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::{Regex, RegexSet};

/// Curated facts: normalized key (lowercase, underscores) to short value.
pub type ProductFacts = BTreeMap<String, String>;

/// Values at or above this length are treated as prose, not facts.
const MAX_FACT_VALUE_CHARS: usize = 100;

static PROMOTIONAL: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"(?i)\b(warranty|guarantee|limited warranty)\b",
        r"(?i)\b(free|complimentary|included at no extra cost)\b",
        r"(?i)\b(best|revolutionary|innovative|cutting-edge)\b",
        r"(?i)\b(certified|patented|proprietary)\b",
        r"(?i)\b(savings|discount|reduced price)\b",
    ])
    .expect("promotional pattern set is valid")
});

static KEY_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z ]+):\s*(.+)$").expect("key-value pattern is valid"));

/// Extracts curated product facts from a free-form description.
///
/// Lines matching the promotional pattern set are dropped entirely, even when
/// they would otherwise parse as a `Key: value` pair. Keys are lowercased
/// with spaces replaced by underscores; later occurrences of the same key
/// overwrite earlier ones.
pub fn distill(description: &str) -> ProductFacts {
    let mut facts = ProductFacts::new();
    for line in description.lines() {
        let line = line.trim();
        if line.is_empty() || PROMOTIONAL.is_match(line) {
            continue;
        }
        if let Some(caps) = KEY_VALUE.captures(line) {
            let value = caps[2].trim();
            if value.chars().count() < MAX_FACT_VALUE_CHARS {
                facts.insert(normalize_key(&caps[1]), value.to_string());
            }
        }
    }
    facts
}

fn normalize_key(raw: &str) -> String {
    raw.trim().to_lowercase().replace(' ', "_")
}
