//! Hint vocabulary: the fixed set of contexts the analyzer can focus on and
//! the hints it produces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aspects of a view the analyzer can be asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContextTag {
    #[serde(rename = "architecture")]
    Architecture,
    #[serde(rename = "vegetation")]
    Vegetation,
    #[serde(rename = "road signs")]
    RoadSigns,
    #[serde(rename = "vehicles")]
    Vehicles,
    #[serde(rename = "climate")]
    Climate,
    #[serde(rename = "population")]
    Population,
}

impl ContextTag {
    pub const ALL: [ContextTag; 6] = [
        Self::Architecture,
        Self::Vegetation,
        Self::RoadSigns,
        Self::Vehicles,
        Self::Climate,
        Self::Population,
    ];

    /// The label sent to the analyzer and shown to the user.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Architecture => "architecture",
            Self::Vegetation => "vegetation",
            Self::RoadSigns => "road signs",
            Self::Vehicles => "vehicles",
            Self::Climate => "climate",
            Self::Population => "population",
        }
    }

    /// Parse a label; case and surrounding whitespace are ignored.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|tag| tag.as_str().eq_ignore_ascii_case(label))
    }
}

impl std::fmt::Display for ContextTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An analyzer observation about one view, scoped to a context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hint {
    pub context: ContextTag,
    /// Inline `data:` URL of the image that produced the hint.
    pub image_url: String,
    /// Public path of the saved copy, when the screenshot store accepted it.
    pub saved_path: Option<String>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}
