//! Pipeline configuration from the environment.
//!
//! The pipeline is wired entirely from environment variables: which storage
//! account to talk to, which describer and translator variants to run, and
//! the endpoints those variants call. Strategy selectors use the
//! `strategy:<name>` form and are parsed once at startup; endpoints are only
//! required when the selected variant actually uses them (validated when the
//! pipeline is built).

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required environment variable is unset or empty.
    MissingVar(&'static str),
    /// A strategy selector does not name a known variant.
    InvalidStrategy { var: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingVar(name) => write!(f, "environment variable {name} is not set"),
            ConfigError::InvalidStrategy { var, value } => {
                write!(f, "{var}={value:?} does not select a known strategy")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Describer variant selector (`DESCRIBER` environment variable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DescriberStrategy {
    /// Multimodal chat completion on the small-model deployment.
    #[default]
    Slm,
    /// Multimodal chat completion on the large-model deployment.
    Llm,
    /// Caption-plus-tags image analysis.
    Vision,
    /// Chat completion with the image reference carried in the text.
    Phi4,
}

impl FromStr for DescriberStrategy {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match strategy_name(raw) {
            Some("slm") => Ok(DescriberStrategy::Slm),
            Some("llm") => Ok(DescriberStrategy::Llm),
            Some("vision") => Ok(DescriberStrategy::Vision),
            Some("phi4") => Ok(DescriberStrategy::Phi4),
            _ => Err(raw.to_string()),
        }
    }
}

/// Translator variant selector (`TRANSLATOR` environment variable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TranslatorStrategy {
    /// Dedicated translation API.
    #[default]
    Translator,
    /// Chat-completion translation on the large-model deployment.
    Llm,
    /// Chat-completion translation on the small-model deployment.
    Phi4,
}

impl FromStr for TranslatorStrategy {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match strategy_name(raw) {
            Some("translator") => Ok(TranslatorStrategy::Translator),
            Some("llm") => Ok(TranslatorStrategy::Llm),
            Some("phi4") => Ok(TranslatorStrategy::Phi4),
            _ => Err(raw.to_string()),
        }
    }
}

fn strategy_name(raw: &str) -> Option<&str> {
    raw.trim().strip_prefix("strategy:").map(str::trim)
}

/// Everything the pipeline needs to build its providers.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub storage_account: String,
    /// User-assigned identity client id, when one is configured.
    pub client_id: Option<String>,
    pub ingest_container: String,
    pub public_container: String,
    /// Languages used when a metadata document names none.
    pub default_languages: Vec<String>,
    pub describer: DescriberStrategy,
    pub translator: TranslatorStrategy,
    pub foundry_endpoint: Option<String>,
    pub deployment_slm: Option<String>,
    pub deployment_llm: Option<String>,
    pub vision_endpoint: Option<String>,
    pub translator_endpoint: Option<String>,
    pub translator_region: Option<String>,
}

impl PipelineConfig {
    /// Reads the recognized environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            storage_account: require("AZURE_STORAGE_ACCOUNT")?,
            client_id: optional("AZURE_CLIENT_ID"),
            ingest_container: optional("INGEST_CONTAINER").unwrap_or_else(|| "ingest".to_string()),
            public_container: optional("PUBLIC_CONTAINER").unwrap_or_else(|| "public".to_string()),
            default_languages: parse_locales(optional("LOCALES").as_deref()),
            describer: parse_strategy("DESCRIBER")?,
            translator: parse_strategy("TRANSLATOR")?,
            foundry_endpoint: optional("AZURE_FOUNDRY_ENDPOINT"),
            deployment_slm: optional("AZURE_FOUNDRY_DEPLOYMENT_SLM"),
            deployment_llm: optional("AZURE_FOUNDRY_DEPLOYMENT_LLM"),
            vision_endpoint: optional("AZURE_VISION_ENDPOINT"),
            translator_endpoint: optional("AZURE_TRANSLATOR_ENDPOINT"),
            translator_region: optional("AZURE_TRANSLATOR_REGION"),
        })
    }

    /// Endpoint lookups used while building providers.
    pub(crate) fn required(
        field: &Option<String>,
        var: &'static str,
    ) -> Result<String, ConfigError> {
        field.clone().ok_or(ConfigError::MissingVar(var))
    }
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::MissingVar(name))
}

fn parse_strategy<S>(var: &'static str) -> Result<S, ConfigError>
where
    S: FromStr<Err = String> + Default,
{
    match optional(var) {
        None => Ok(S::default()),
        Some(raw) => raw
            .parse()
            .map_err(|value| ConfigError::InvalidStrategy { var, value }),
    }
}

/// `LOCALES` is a comma-joined list; empty or unset means English only.
pub fn parse_locales(raw: Option<&str>) -> Vec<String> {
    let locales: Vec<String> = raw
        .unwrap_or_default()
        .split(',')
        .map(|code| code.trim().to_string())
        .filter(|code| !code.is_empty())
        .collect();
    if locales.is_empty() {
        vec!["en".to_string()]
    } else {
        locales
    }
}
