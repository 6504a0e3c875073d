//! Attachment metadata population for HEIC files.
//!
//! Hosts that cannot read HEIC store the attachment with no pixel geometry.
//! When metadata is requested for such an attachment, the codec is asked for
//! the image's dimensions and the gaps are filled:
//!
//! | Field    | Filled with                               |
//! |----------|-------------------------------------------|
//! | `width`  | codec-reported width                      |
//! | `height` | codec-reported height                     |
//! | `file`   | path relative to the uploads directory    |
//! | `sizes`  | empty map (no intermediate sizes exist)   |
//!
//! Values already present win. A zero width or height counts as missing.
//! Non-HEIC files, metadata that already has geometry, and codec failures all
//! return the metadata unchanged.

use crate::codec::Codec;
use crate::eligibility::ingest_eligible;
use crate::types::AttachmentMetadata;
use std::collections::BTreeMap;
use std::path::Path;

fn missing(value: Option<u32>) -> bool {
    value.is_none_or(|v| v == 0)
}

/// Fill missing geometry for a stored HEIC file.
pub fn populate_metadata(
    codec: &impl Codec,
    path: &Path,
    relative_file: &str,
    mut meta: AttachmentMetadata,
) -> AttachmentMetadata {
    if meta.has_geometry() || !ingest_eligible(codec, path) {
        return meta;
    }
    let dimensions = match codec.identify(path) {
        Ok(d) => d,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "could not read HEIC geometry");
            return meta;
        }
    };

    if missing(meta.width) {
        meta.width = Some(dimensions.width);
    }
    if missing(meta.height) {
        meta.height = Some(dimensions.height);
    }
    if meta.file.is_none() {
        meta.file = Some(relative_file.to_string());
    }
    if meta.sizes.is_none() {
        meta.sizes = Some(BTreeMap::new());
    }
    meta
}
