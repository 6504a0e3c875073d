//! Whether HEIC conversion applies to a file.
//!
//! Two entry points, one per pipeline stage:
//!
//! - [`ingest_eligible`]: after an attachment is stored. Decided by the stored
//!   file's extension alone, compared case-sensitively against `heic`.
//! - [`upload_eligible`]: before an upload is stored, only in replace mode.
//!   Decided by the sniffed MIME type (extension + signature).
//!
//! Both require a working codec. A missing codec is not an error: the answer
//! is simply "no", and the file is stored as uploaded.

use crate::codec::Codec;
use crate::format::ConversionConfig;
use crate::naming::file_extension;
use crate::sniff::{HEIC_MIME, UploadTypes, sniff_mime};
use crate::types::UploadCandidate;
use std::path::Path;

const HEIC_EXTENSION: &str = "heic";

/// Stored file has a lowercase `.heic` extension.
pub fn is_heic_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(file_extension)
        == Some(HEIC_EXTENSION)
}

/// Conversion applies to a stored attachment file.
pub fn ingest_eligible(codec: &impl Codec, path: &Path) -> bool {
    is_heic_file(path) && codec.is_available()
}

/// Replace-mode conversion applies to an upload that has not been stored yet.
pub fn upload_eligible(
    codec: &impl Codec,
    candidate: &UploadCandidate,
    config: &ConversionConfig,
    types: &UploadTypes,
) -> bool {
    if !config.replace_original || !candidate.is_well_formed() {
        return false;
    }
    let sniffed = sniff_mime(&candidate.temp_path, &candidate.name, types);
    sniffed.as_deref() == Some(HEIC_MIME) && codec.is_available()
}
