//! Shared types passed between the pipeline, the store, and the CLI.
//!
//! These are persisted in the library manifest (`.library.json`), so field
//! names are part of the on-disk format.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Opaque attachment identifier, assigned by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttachmentId(pub u64);

impl fmt::Display for AttachmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for AttachmentId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(AttachmentId)
    }
}

/// A file that has been uploaded but not yet stored.
///
/// `name` and `mime_type` are what the uploader declared; in replace mode the
/// pipeline rewrites them (and `size`) to describe the converted file that now
/// sits at `temp_path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCandidate {
    pub temp_path: PathBuf,
    pub name: String,
    pub mime_type: Option<String>,
    pub size: u64,
}

impl UploadCandidate {
    /// A candidate with no temp file or no name does not look like an upload.
    pub fn is_well_formed(&self) -> bool {
        !self.temp_path.as_os_str().is_empty() && !self.name.is_empty()
    }
}

/// A stored media item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: AttachmentId,
    /// Path relative to the uploads directory, `/`-separated.
    pub file: String,
    pub title: String,
    pub mime_type: String,
    /// The other half of an original/converted-copy pair.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy_of: Option<AttachmentId>,
    #[serde(default)]
    pub meta: AttachmentMetadata,
}

/// Per-attachment metadata: pixel geometry, stored path, generated sizes.
///
/// Every field is optional so partially-populated metadata (e.g. from a host
/// that could not read HEIC) round-trips unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachmentMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Path relative to the uploads directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Generated intermediate sizes. The core only ever initializes this.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sizes: Option<BTreeMap<String, serde_json::Value>>,
}

impl AttachmentMetadata {
    /// Width and height both present and non-zero.
    pub fn has_geometry(&self) -> bool {
        self.width.is_some_and(|w| w > 0) && self.height.is_some_and(|h| h > 0)
    }
}
