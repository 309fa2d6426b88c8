//! Alt-text pipeline.
//!
//! For each product image landing in the ingest area, the pipeline builds a
//! multilingual alt-text sidecar and promotes the image to the public area.
//! The stages, in order: load the companion metadata document, distill
//! product facts, derive vision hints, inline the image bytes as a data URL,
//! run the describer, normalize its answer into `alt_en`, translate into the
//! requested languages, then persist the sidecar, the blob tags, and the
//! public copy.
//!
//! [`Pipeline`] drives the stages against three seams ([`ObjectStore`],
//! [`Describe`], [`Translate`]), so the webhook server runs it against the
//! live services and the test suite runs it against in-memory fakes.
//! Failures converge on [`PipelineError`]; the only errors swallowed along
//! the way are the ones the design treats as soft (absent metadata, tag-set
//! failures, per-language translation fallbacks).

pub use context::{derive_hints, distill, Angle, AssetMetadata, ProductFacts, VisionHints};
pub use describe::{
    ChatDescriber, ContentMode, Describe, DescribeError, DescribeRequest, Description, TokenUsage,
    VisionDescriber,
};
pub use identity::{IdentityError, TokenProvider, COGNITIVE_AUDIENCE, STORAGE_AUDIENCE};
pub use storage::{
    is_image, mime_for, sidecar_name, with_extension, BlobStore, ObjectStore, StorageError,
};
pub use translate::{
    api_language, normalize_lang, ChatTranslator, Translate, TranslateError, TranslationApi,
};

pub mod config;

pub use config::{ConfigError, DescriberStrategy, PipelineConfig, TranslatorStrategy};

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Errors that abort an orchestrator run.
#[derive(Debug)]
pub enum PipelineError {
    Config(ConfigError),
    Storage(StorageError),
    Describe(DescribeError),
    /// The describer answered, but nothing usable survived normalization.
    EmptyAltText { blob: String },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Config(err) => write!(f, "pipeline configuration failure: {err}"),
            PipelineError::Storage(err) => write!(f, "store operation failed: {err}"),
            PipelineError::Describe(err) => write!(f, "describer failure: {err}"),
            PipelineError::EmptyAltText { blob } => {
                write!(f, "describer produced no alt text for {blob}")
            }
        }
    }
}

impl Error for PipelineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PipelineError::Config(err) => Some(err),
            PipelineError::Storage(err) => Some(err),
            PipelineError::Describe(err) => Some(err),
            PipelineError::EmptyAltText { .. } => None,
        }
    }
}

impl From<ConfigError> for PipelineError {
    fn from(value: ConfigError) -> Self {
        PipelineError::Config(value)
    }
}

impl From<StorageError> for PipelineError {
    fn from(value: StorageError) -> Self {
        PipelineError::Storage(value)
    }
}

impl From<DescribeError> for PipelineError {
    fn from(value: DescribeError) -> Self {
        PipelineError::Describe(value)
    }
}

/// The persisted sidecar document, written as `<stem>.alt.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AltTextSidecar {
    pub asset: String,
    /// Blob name of the described image.
    pub image: String,
    pub source: String,
    /// Lowercase two-letter code to translated alt text; `en` always present.
    #[serde(rename = "altText")]
    pub alt_text: BTreeMap<String, String>,
    #[serde(rename = "generatedAt")]
    pub generated_at: String,
}

/// What one orchestrator run produced and persisted.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub sidecar: AltTextSidecar,
    /// Name the sidecar was written under.
    pub sidecar_blob: String,
    pub tags: BTreeMap<String, String>,
    pub usage: Option<TokenUsage>,
}

/// Orchestrator for one image at a time.
pub struct Pipeline {
    store: Arc<dyn ObjectStore>,
    describer: Arc<dyn Describe>,
    translator: Arc<dyn Translate>,
    ingest_container: String,
    public_container: String,
    default_languages: Vec<String>,
}

impl Pipeline {
    /// Builds the production pipeline: blob store plus the describer and
    /// translator variants selected by the configuration.
    pub fn new(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let tokens = TokenProvider::new(config.client_id.clone());
        let store = Arc::new(BlobStore::new(&config.storage_account, tokens.clone()));

        let describer: Arc<dyn Describe> = match config.describer {
            DescriberStrategy::Slm => Arc::new(ChatDescriber::new(
                PipelineConfig::required(&config.foundry_endpoint, "AZURE_FOUNDRY_ENDPOINT")?,
                PipelineConfig::required(&config.deployment_slm, "AZURE_FOUNDRY_DEPLOYMENT_SLM")?,
                300,
                ContentMode::Multimodal,
                tokens.clone(),
            )),
            DescriberStrategy::Llm => Arc::new(ChatDescriber::new(
                PipelineConfig::required(&config.foundry_endpoint, "AZURE_FOUNDRY_ENDPOINT")?,
                PipelineConfig::required(&config.deployment_llm, "AZURE_FOUNDRY_DEPLOYMENT_LLM")?,
                500,
                ContentMode::Multimodal,
                tokens.clone(),
            )),
            DescriberStrategy::Phi4 => Arc::new(ChatDescriber::new(
                PipelineConfig::required(&config.foundry_endpoint, "AZURE_FOUNDRY_ENDPOINT")?,
                PipelineConfig::required(&config.deployment_slm, "AZURE_FOUNDRY_DEPLOYMENT_SLM")?,
                300,
                ContentMode::TextWithImageUrl,
                tokens.clone(),
            )),
            DescriberStrategy::Vision => Arc::new(VisionDescriber::new(
                PipelineConfig::required(&config.vision_endpoint, "AZURE_VISION_ENDPOINT")?,
                tokens.clone(),
            )),
        };

        let translator: Arc<dyn Translate> = match config.translator {
            TranslatorStrategy::Translator => Arc::new(TranslationApi::new(
                PipelineConfig::required(
                    &config.translator_endpoint,
                    "AZURE_TRANSLATOR_ENDPOINT",
                )?,
                config.translator_region.clone(),
                tokens.clone(),
            )),
            TranslatorStrategy::Llm => Arc::new(ChatTranslator::new(
                PipelineConfig::required(&config.foundry_endpoint, "AZURE_FOUNDRY_ENDPOINT")?,
                PipelineConfig::required(&config.deployment_llm, "AZURE_FOUNDRY_DEPLOYMENT_LLM")?,
                tokens.clone(),
            )),
            TranslatorStrategy::Phi4 => Arc::new(ChatTranslator::new(
                PipelineConfig::required(&config.foundry_endpoint, "AZURE_FOUNDRY_ENDPOINT")?,
                PipelineConfig::required(&config.deployment_slm, "AZURE_FOUNDRY_DEPLOYMENT_SLM")?,
                tokens,
            )),
        };

        Ok(Self::with_parts(
            store,
            describer,
            translator,
            &config.ingest_container,
            &config.public_container,
            config.default_languages.clone(),
        ))
    }

    /// Assembles a pipeline from explicit parts; the constructor tests and
    /// the server wiring share.
    pub fn with_parts(
        store: Arc<dyn ObjectStore>,
        describer: Arc<dyn Describe>,
        translator: Arc<dyn Translate>,
        ingest_container: &str,
        public_container: &str,
        default_languages: Vec<String>,
    ) -> Self {
        Self {
            store,
            describer,
            translator,
            ingest_container: ingest_container.to_string(),
            public_container: public_container.to_string(),
            default_languages,
        }
    }

    /// Runs the full pipeline for one blob in the ingest container.
    ///
    /// `supplied_metadata` and `cms_text` short-circuit the metadata fetch
    /// and the fact source for direct requests that already carry them.
    pub async fn process_blob(
        &self,
        blob_name: &str,
        supplied_metadata: Option<AssetMetadata>,
        cms_text: Option<String>,
    ) -> Result<ProcessOutcome, PipelineError> {
        let metadata = match supplied_metadata {
            Some(metadata) => metadata,
            None => self
                .store
                .read_metadata(&self.ingest_container, blob_name)
                .await
                .unwrap_or_default(),
        };

        let languages = if metadata.languages.is_empty() {
            self.default_languages.clone()
        } else {
            metadata.languages.clone()
        };

        let fact_source = cms_text.or_else(|| metadata.description.clone());
        let facts = distill(fact_source.as_deref().unwrap_or_default());
        let hints = derive_hints(blob_name, &[], &metadata);

        let image_ref = self
            .store
            .data_url(&self.ingest_container, blob_name)
            .await?;

        let request = DescribeRequest {
            blob_name: blob_name.to_string(),
            image_ref,
            metadata: metadata.clone(),
            facts,
            hints,
        };
        let description = self.describer.describe(&request).await?;
        let alt_en = describe::normalize::extract_alt(&description.content);
        if alt_en.is_empty() {
            return Err(PipelineError::EmptyAltText {
                blob: blob_name.to_string(),
            });
        }
        if let Some(usage) = description.usage {
            tracing::info!(
                blob = %blob_name,
                total_tokens = usage.total_tokens,
                "describer completed"
            );
        }

        let targets: Vec<String> = languages
            .iter()
            .map(|code| normalize_lang(code))
            .filter(|code| !code.is_empty() && code != "en")
            .collect();
        let mut alt_text = self.translator.translate(&alt_en, &targets, &metadata).await;
        alt_text.insert("en".to_string(), alt_en.clone());

        let sidecar = AltTextSidecar {
            asset: metadata
                .asset
                .clone()
                .unwrap_or_else(|| stem(blob_name).to_string()),
            image: blob_name.to_string(),
            source: metadata.source.clone().unwrap_or_default(),
            alt_text,
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        };
        let tags = build_tags(&sidecar.alt_text);

        let sidecar_blob = sidecar_name(blob_name);
        let body = serde_json::to_vec(&sidecar).expect("sidecar serializes");
        self.store
            .write(
                &self.ingest_container,
                &sidecar_blob,
                body,
                "application/json",
            )
            .await?;
        self.store
            .set_tags(&self.ingest_container, blob_name, &tags)
            .await?;
        if !blob_name.to_lowercase().ends_with(".json") {
            self.store
                .copy(
                    &self.ingest_container,
                    blob_name,
                    &self.public_container,
                    blob_name,
                )
                .await?;
        }

        tracing::info!(
            blob = %blob_name,
            sidecar = %sidecar_blob,
            langs = %tags["langs"],
            "image processed"
        );

        Ok(ProcessOutcome {
            sidecar,
            sidecar_blob,
            tags,
            usage: description.usage,
        })
    }
}

/// Tag set applied to a processed image.
fn build_tags(alt_text: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let langs: Vec<&str> = alt_text.keys().map(String::as_str).collect();
    BTreeMap::from([
        ("processed".to_string(), "true".to_string()),
        ("alt.v".to_string(), "1".to_string()),
        ("langs".to_string(), langs.join(",")),
    ])
}

/// Blob name without its final extension.
fn stem(blob_name: &str) -> &str {
    blob_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .filter(|stem| !stem.is_empty())
        .unwrap_or(blob_name)
}
