//! Alt-text translators.
//!
//! A translator maps the English alt text into a set of target languages.
//! [`Translate::translate`] drives the language loop and owns the fallback
//! contract: English passes through verbatim, a failed language gets the
//! English source instead of failing the batch, and output keys are the
//! caller's lowercase two-letter codes even when the wire call uses an API
//! alias (`jp` is requested as `ja` but keyed as `jp`).
//!
//! Implementations provide [`Translate::translate_one`]:
//! [`TranslationApi`] calls the dedicated translation endpoint,
//! [`ChatTranslator`] drives a chat-completion deployment instead.

pub mod api;
pub mod chat;

pub use api::TranslationApi;
pub use chat::ChatTranslator;

use std::collections::BTreeMap;

use async_trait::async_trait;
use context::AssetMetadata;

#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("translator request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("translator returned {status}: {body}")]
    Service { status: u16, body: String },

    #[error("translator response missing translation text")]
    Malformed,

    #[error(transparent)]
    Identity(#[from] identity::IdentityError),
}

/// Non-ISO aliases accepted in metadata documents, mapped to the codes the
/// translation API understands.
const API_ALIASES: &[(&str, &str)] = &[
    ("jp", "ja"),
    ("cn", "zh-Hans"),
    ("tw", "zh-Hant"),
    ("kr", "ko"),
    ("br", "pt"),
    ("cz", "cs"),
    ("dk", "da"),
    ("gr", "el"),
    ("se", "sv"),
    ("no", "nb"),
];

/// Maps a normalized language code onto the API's spelling.
pub fn api_language(code: &str) -> &str {
    API_ALIASES
        .iter()
        .find(|(alias, _)| *alias == code)
        .map(|(_, api)| *api)
        .unwrap_or(code)
}

/// Lowercase two-letter prefix of a language code; empty when the input is
/// too short to be a code at all.
pub fn normalize_lang(code: &str) -> String {
    let lowered: String = code.trim().to_lowercase().chars().take(2).collect();
    if lowered.chars().count() == 2 {
        lowered
    } else {
        String::new()
    }
}

#[async_trait]
pub trait Translate: Send + Sync {
    /// Translates `text` into one normalized target language. `lang` is the
    /// caller's code; implementations apply [`api_language`] themselves.
    async fn translate_one(
        &self,
        text: &str,
        lang: &str,
        metadata: &AssetMetadata,
    ) -> Result<String, TranslateError>;

    /// Translates `text` into every requested language, sequentially.
    ///
    /// Never fails: a language whose call errors is assigned the English
    /// source text. Throughput is dominated by the describer call, and
    /// sequential issue avoids rate-limit bursts.
    async fn translate(
        &self,
        text: &str,
        languages: &[String],
        metadata: &AssetMetadata,
    ) -> BTreeMap<String, String> {
        let mut translations = BTreeMap::new();
        for language in languages {
            let code = normalize_lang(language);
            if code.is_empty() {
                tracing::warn!(code = %language, "skipping unrecognizable language code");
                continue;
            }
            if code == "en" {
                translations.insert(code, text.to_string());
                continue;
            }
            let translated = match self.translate_one(text, &code, metadata).await {
                Ok(translated) => translated,
                Err(err) => {
                    tracing::warn!(lang = %code, error = %err, "translation failed, keeping English");
                    text.to_string()
                }
            };
            translations.insert(code, translated);
        }
        translations
    }
}
