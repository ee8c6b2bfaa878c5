//! Build export report.
//!
//! The image builder writes a `report.toml` after exporting an image:
//!
//! ```toml
//! [image]
//! tags = ["registry.io/app:latest", "registry.io/app:v1"]
//! ```
//!
//! Only the tag list is consumed here; every other field is ignored.

use std::path::Path;

use cosigner_core::error::{Result, SignerError};
use serde::{Deserialize, Serialize};

/// Result of a completed image build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportReport {
    #[serde(default)]
    pub image: ImageReport,
}

/// The `[image]` table of an export report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReport {
    /// Published tags, in the order the builder wrote them.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ExportReport {
    /// Build a report directly from a tag list.
    pub fn with_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            image: ImageReport {
                tags: tags.into_iter().map(Into::into).collect(),
            },
        }
    }

    /// Parse a report from TOML text.
    pub fn from_toml_str(data: &str) -> Result<Self> {
        Ok(toml::from_str(data)?)
    }

    /// Read and parse a report file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            SignerError::Report(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&data)
    }

    /// The tag that gets signed: the first one the builder published.
    pub fn primary_tag(&self) -> Option<&str> {
        self.image.tags.first().map(String::as_str)
    }

    /// All published tags.
    pub fn tags(&self) -> &[String] {
        &self.image.tags
    }
}
