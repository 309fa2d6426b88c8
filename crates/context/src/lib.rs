//! Per-image context for the alt-text pipeline.
//!
//! This crate holds the pieces of an orchestrator run that are derived before
//! any model is called:
//!
//! - [`AssetMetadata`]: the companion metadata document stored next to an
//!   image (retrieved as `<stem>.yml`), a shallow mapping with at most one
//!   list
//! - [`distill`]: line-wise extraction of curated product facts from the
//!   free-form description, with promotional content filtered out
//! - [`VisionHints`]: camera-angle and observed-object hints derived from the
//!   blob name, provider tags, or an explicit metadata field
//!
//! Everything here is pure and synchronous; the crates that talk to the
//! network consume these types.

pub mod distill;
pub mod hints;

pub use distill::{distill, ProductFacts};
pub use hints::{derive_hints, Angle, VisionHints};

use serde::{Deserialize, Serialize};

/// Companion metadata document for an image.
///
/// All fields are optional: an absent or malformed document degrades to
/// `AssetMetadata::default()` and the pipeline proceeds English-only with no
/// brand/model context. `brand` is accepted as an alias for `make` because
/// both spellings occur in upstream CMS exports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetMetadata {
    /// Asset identifier carried through to the sidecar.
    pub asset: Option<String>,

    /// Source tag; selects the system prompt for the describer.
    pub source: Option<String>,

    /// Target languages as two-letter codes (case-insensitive, may include
    /// non-ISO aliases such as `JP`).
    pub languages: Vec<String>,

    /// Manufacturer / brand name.
    #[serde(alias = "brand")]
    pub make: Option<String>,

    /// Model name.
    pub model: Option<String>,

    /// Free-form description; input to the fact distiller.
    pub description: Option<String>,

    /// Explicit camera-angle hint (`front`, `angle`, `side`, `top`,
    /// `detail`, `action`).
    pub angle: Option<String>,
}

impl AssetMetadata {
    /// True when the document carries no usable fields at all.
    pub fn is_empty(&self) -> bool {
        *self == AssetMetadata::default()
    }
}
