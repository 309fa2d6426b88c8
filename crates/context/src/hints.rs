//! Vision hints: camera angle and observed objects.
//!
//! Describers produce noticeably better alt text when the prompt says which
//! view of the product the image shows. The angle is derived from the blob
//! name first (photographers encode it there), then from any provider tag
//! list, then from an explicit `angle` field in the metadata document.

use crate::AssetMetadata;

/// Camera angle of a product shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Angle {
    Front,
    Angled,
    Side,
    Top,
    Detail,
    Action,
}

impl Angle {
    /// Wire/prompt spelling of the angle.
    pub fn as_str(self) -> &'static str {
        match self {
            Angle::Front => "front",
            Angle::Angled => "angle",
            Angle::Side => "side",
            Angle::Top => "top",
            Angle::Detail => "detail",
            Angle::Action => "action",
        }
    }

    /// Parses the explicit metadata spelling. Unknown values yield `None`.
    pub fn parse(value: &str) -> Option<Angle> {
        match value.trim().to_lowercase().as_str() {
            "front" => Some(Angle::Front),
            "angle" => Some(Angle::Angled),
            "side" => Some(Angle::Side),
            "top" => Some(Angle::Top),
            "detail" => Some(Angle::Detail),
            "action" => Some(Angle::Action),
            _ => None,
        }
    }
}

/// Keyword table: first angle whose any substring matches wins.
const ANGLE_KEYWORDS: &[(Angle, &[&str])] = &[
    (
        Angle::Front,
        &[
            "front view",
            "front-facing",
            "face-on",
            "straight on",
            "frontal",
        ],
    ),
    (
        Angle::Angled,
        &["angled", "perspective", "iso", "3/4 view", "three-quarter"],
    ),
    (
        Angle::Side,
        &["side view", "profile", "left side", "right side"],
    ),
    (Angle::Top, &["top view", "overhead", "above", "bird's eye"]),
    (
        Angle::Detail,
        &["close-up", "close up", "detail", "macro", "zoom"],
    ),
    (
        Angle::Action,
        &["in use", "action shot", "printing", "scanning", "operating"],
    ),
];

/// Structured hints handed to the describer prompt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisionHints {
    pub angle: Option<Angle>,
    pub objects: Vec<String>,
}

/// Derives hints from the blob name, a provider-supplied tag list, and the
/// metadata document, in that order of precedence for the angle.
pub fn derive_hints(blob_name: &str, tags: &[String], metadata: &AssetMetadata) -> VisionHints {
    let angle = angle_from_text(blob_name)
        .or_else(|| tags.iter().find_map(|tag| angle_from_text(tag)))
        .or_else(|| metadata.angle.as_deref().and_then(Angle::parse));
    VisionHints {
        angle,
        objects: tags.to_vec(),
    }
}

fn angle_from_text(text: &str) -> Option<Angle> {
    let haystack = text.to_lowercase();
    for (angle, keywords) in ANGLE_KEYWORDS {
        if keywords.iter().any(|kw| haystack.contains(kw)) {
            return Some(*angle);
        }
    }
    None
}
