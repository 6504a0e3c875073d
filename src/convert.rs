//! Conversion executor: decode a HEIC source, encode the resolved format.
//!
//! Two output modes:
//!
//! - **Copy** ([`convert_copy`]): the derived file is written next to the
//!   source as `<basename>.<ext>`, uniquified so nothing is overwritten. The
//!   source is never touched.
//! - **In place** ([`convert_upload`]): the converted bytes replace the
//!   upload's temporary file, and the candidate's name, MIME type and size are
//!   rewritten to match.
//!
//! ## Failure handling
//!
//! Every failure is a skip, never a fault. The order of checks is:
//!
//! 1. Codec missing → [`ConversionError::CodecUnavailable`]
//! 2. Source missing → [`ConversionError::SourceUnreadable`]
//! 3. Capability probe says HEIC is not readable →
//!    [`ConversionError::UnsupportedSourceFormat`], without attempting a decode
//! 4. Transcode; its error text goes through
//!    [`classify_codec_error`](crate::codec::classify_codec_error)

use crate::codec::{
    Codec, CodecError, CodecFailure, Dimensions, TranscodeParams, classify_codec_error,
};
use crate::format::{ResolvedFormat, TargetFormat};
use crate::naming::{derived_filename, unique_filename};
use crate::types::UploadCandidate;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Format name passed to the codec's capability probe.
pub const HEIC_CODEC_NAME: &str = "HEIC";

/// Operator-facing explanation for a codec without HEIC support.
pub const UNSUPPORTED_HEIC_MESSAGE: &str = "ImageMagick is installed, but does not support HEIC. \
     The version might be too old, or perhaps your server is missing libheif.";

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("image codec is not available")]
    CodecUnavailable,
    #[error("codec cannot decode HEIC: {detail}")]
    UnsupportedSourceFormat {
        version: Option<String>,
        detail: String,
    },
    #[error("source image could not be read: {}", .0.display())]
    SourceUnreadable(PathBuf),
    #[error("derived file {} could not be added to the library: {reason}", .path.display())]
    DerivedIngestFailed { path: PathBuf, reason: String },
    #[error("codec failed: {0}")]
    Codec(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConversionError {
    /// Operator diagnostic for failures worth explaining on a diagnostics view.
    pub fn diagnostic(&self) -> Option<String> {
        match self {
            Self::UnsupportedSourceFormat { version, .. } => Some(format!(
                "{} Installed version is {}",
                UNSUPPORTED_HEIC_MESSAGE,
                version.as_deref().unwrap_or("unknown")
            )),
            _ => None,
        }
    }
}

/// Outcome of a successful conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionResult {
    pub output_path: PathBuf,
    pub output_format: TargetFormat,
    pub output_size_bytes: u64,
    pub dimensions: Dimensions,
}

/// Map a codec error onto the conversion taxonomy.
pub(crate) fn from_codec_error(
    codec: &impl Codec,
    source: &Path,
    err: CodecError,
) -> ConversionError {
    match err {
        CodecError::Unavailable => ConversionError::CodecUnavailable,
        CodecError::Io(e) => ConversionError::Io(e),
        CodecError::Failed(raw) => match classify_codec_error(&raw) {
            CodecFailure::UnsupportedSourceFormat => ConversionError::UnsupportedSourceFormat {
                version: codec.version(),
                detail: raw,
            },
            CodecFailure::SourceUnreadable => {
                ConversionError::SourceUnreadable(source.to_path_buf())
            }
            CodecFailure::Other => ConversionError::Codec(raw),
        },
    }
}

/// Transcode `source` into `output` using the resolved format.
///
/// `output` may equal `source`.
pub fn convert(
    codec: &impl Codec,
    source: &Path,
    output: &Path,
    resolved: &ResolvedFormat,
) -> Result<ConversionResult, ConversionError> {
    if !codec.is_available() {
        return Err(ConversionError::CodecUnavailable);
    }
    if !source.is_file() {
        return Err(ConversionError::SourceUnreadable(source.to_path_buf()));
    }
    if codec.supports_decode(HEIC_CODEC_NAME) == Some(false) {
        return Err(ConversionError::UnsupportedSourceFormat {
            version: codec.version(),
            detail: "codec does not list HEIC as a readable format".to_string(),
        });
    }

    let params = TranscodeParams {
        source: source.to_path_buf(),
        output: output.to_path_buf(),
        format: resolved.format,
    };
    let dimensions = codec
        .transcode(&params)
        .map_err(|e| from_codec_error(codec, source, e))?;
    let output_size_bytes = std::fs::metadata(output)?.len();

    tracing::info!(
        source = %source.display(),
        output = %output.display(),
        format = %resolved.format,
        bytes = output_size_bytes,
        "converted HEIC image"
    );

    Ok(ConversionResult {
        output_path: output.to_path_buf(),
        output_format: resolved.format,
        output_size_bytes,
        dimensions,
    })
}

/// Convert a stored HEIC file into a uniquely named sibling.
pub fn convert_copy(
    codec: &impl Codec,
    source: &Path,
    resolved: &ResolvedFormat,
) -> Result<ConversionResult, ConversionError> {
    let unreadable = || ConversionError::SourceUnreadable(source.to_path_buf());
    let dir = source.parent().ok_or_else(unreadable)?;
    let name = source
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(unreadable)?;
    let derived = derived_filename(name, &resolved.extension);
    let output = dir.join(unique_filename(dir, &derived));
    convert(codec, source, &output, resolved)
}

/// Convert an upload's temporary file in place and describe the new file.
pub fn convert_upload(
    codec: &impl Codec,
    candidate: &UploadCandidate,
    resolved: &ResolvedFormat,
) -> Result<(UploadCandidate, ConversionResult), ConversionError> {
    let result = convert(codec, &candidate.temp_path, &candidate.temp_path, resolved)?;
    let converted = UploadCandidate {
        temp_path: candidate.temp_path.clone(),
        name: derived_filename(&candidate.name, &resolved.extension),
        mime_type: Some(resolved.mime_type.clone()),
        size: result.output_size_bytes,
    };
    Ok((converted, result))
}
