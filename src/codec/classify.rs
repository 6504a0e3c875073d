//! Classification of codec error text.
//!
//! ImageMagick has no structured way to say "I cannot read HEIC" after the
//! fact; it reports a missing decoder through its error channel. This module
//! is the one place that reads that text. Callers get a [`CodecFailure`] and
//! never match on strings themselves.

/// Error text ImageMagick emits when it has no HEIC decoder (libheif missing
/// or ImageMagick too old).
pub const HEIC_DELEGATE_MISSING: &str = "no decode delegate for this image format `HEIC'";

/// Same failure reported against the HEIF container name, which some builds use.
const HEIF_DELEGATE_MISSING: &str = "no decode delegate for this image format `HEIF'";

/// Error text for a source the codec could not open at all.
const UNABLE_TO_OPEN: &str = "unable to open image";

/// What a raw codec failure means for the conversion policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecFailure {
    /// The codec works but cannot decode the source format.
    UnsupportedSourceFormat,
    /// The codec could not read the source, or failed without saying why.
    SourceUnreadable,
    /// Anything else: surfaced verbatim to the operator log.
    Other,
}

/// Classify a codec's raw error text.
///
/// A failure with no diagnostic text at all is treated as an unreadable
/// source: the decode produced nothing and the codec offered no reason.
pub fn classify_codec_error(raw: &str) -> CodecFailure {
    let text = raw.trim();
    if text.is_empty() {
        return CodecFailure::SourceUnreadable;
    }
    if text.contains(HEIC_DELEGATE_MISSING) || text.contains(HEIF_DELEGATE_MISSING) {
        return CodecFailure::UnsupportedSourceFormat;
    }
    if text.contains(UNABLE_TO_OPEN) {
        return CodecFailure::SourceUnreadable;
    }
    CodecFailure::Other
}
