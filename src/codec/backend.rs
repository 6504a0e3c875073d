//! Codec trait and shared types.
//!
//! The [`Codec`] trait is the only boundary between the conversion policy and
//! the image library that does the pixel work. Every operation the policy
//! needs is here: availability, version reporting, a per-format capability
//! probe, transcode, and identify.
//!
//! The production implementation is
//! [`MagickCodec`](super::magick::MagickCodec), which drives the ImageMagick
//! command-line tools. Nothing else in the crate knows ImageMagick exists.

use super::params::TranscodeParams;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("image codec is not available")]
    Unavailable,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The codec ran and reported a failure. Holds the codec's own error text,
    /// unmodified, so it can be classified by
    /// [`classify_codec_error`](super::classify::classify_codec_error).
    #[error("codec failed: {0}")]
    Failed(String),
}

/// Pixel geometry reported by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image codecs.
///
/// Implementations must be cheap to query for availability: the pipeline asks
/// before every conversion and treats `false` as a silent no-op.
pub trait Codec {
    /// Whether the codec can be invoked at all in this environment.
    fn is_available(&self) -> bool;

    /// Human-readable version string, e.g. `ImageMagick 7.1.1-15 Q16-HDRI`.
    fn version(&self) -> Option<String>;

    /// Ask the codec whether it can decode `format` (e.g. `"HEIC"`).
    ///
    /// `None` means the codec cannot answer; callers then fall back to
    /// attempting the decode and classifying the error text.
    fn supports_decode(&self, format: &str) -> Option<bool>;

    /// Decode `params.source` and encode it as `params.format` at `params.output`.
    ///
    /// Returns the geometry of the written image.
    fn transcode(&self, params: &TranscodeParams) -> Result<Dimensions, CodecError>;

    /// Decode just enough of `path` to report its geometry.
    fn identify(&self, path: &Path) -> Result<Dimensions, CodecError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::format::TargetFormat;
    use std::sync::Mutex;

    pub const MOCK_VERSION: &str = "ImageMagick 7.1.1-15 Q16-HDRI x86_64";

    /// Mock codec that records operations and writes placeholder output files.
    /// Uses Mutex (not RefCell) so it can be shared freely in tests.
    pub struct MockCodec {
        pub available: bool,
        pub version: Option<String>,
        pub heic_support: Option<bool>,
        pub dimensions: Dimensions,
        pub failure: Mutex<Option<String>>,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Transcode {
            source: String,
            output: String,
            format: TargetFormat,
        },
        Identify(String),
    }

    impl Default for MockCodec {
        fn default() -> Self {
            Self {
                available: true,
                version: Some(MOCK_VERSION.to_string()),
                heic_support: None,
                dimensions: Dimensions {
                    width: 4032,
                    height: 3024,
                },
                failure: Mutex::new(None),
                operations: Mutex::new(Vec::new()),
            }
        }
    }

    impl MockCodec {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn unavailable() -> Self {
            Self {
                available: false,
                version: None,
                ..Self::default()
            }
        }

        /// Every transcode/identify fails with `message` as the codec's error text.
        pub fn failing(message: &str) -> Self {
            Self {
                failure: Mutex::new(Some(message.to_string())),
                ..Self::default()
            }
        }

        pub fn without_heic_support() -> Self {
            Self {
                heic_support: Some(false),
                ..Self::default()
            }
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        fn check_failure(&self) -> Result<(), CodecError> {
            match self.failure.lock().unwrap().as_ref() {
                Some(message) => Err(CodecError::Failed(message.clone())),
                None => Ok(()),
            }
        }
    }

    impl Codec for MockCodec {
        fn is_available(&self) -> bool {
            self.available
        }

        fn version(&self) -> Option<String> {
            self.version.clone()
        }

        fn supports_decode(&self, _format: &str) -> Option<bool> {
            self.heic_support
        }

        fn transcode(&self, params: &TranscodeParams) -> Result<Dimensions, CodecError> {
            self.operations.lock().unwrap().push(RecordedOp::Transcode {
                source: params.source.to_string_lossy().to_string(),
                output: params.output.to_string_lossy().to_string(),
                format: params.format,
            });
            if !self.available {
                return Err(CodecError::Unavailable);
            }
            self.check_failure()?;
            // Mirror a real decode: an unreadable source fails before any output exists.
            std::fs::metadata(&params.source)?;
            std::fs::write(
                &params.output,
                format!("encoded:{}", params.format.codec_name()),
            )?;
            Ok(self.dimensions)
        }

        fn identify(&self, path: &Path) -> Result<Dimensions, CodecError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Identify(path.to_string_lossy().to_string()));
            if !self.available {
                return Err(CodecError::Unavailable);
            }
            self.check_failure()?;
            Ok(self.dimensions)
        }
    }

    #[test]
    fn mock_records_transcode_and_writes_output() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("in.heic");
        let output = tmp.path().join("out.webp");
        std::fs::write(&source, b"heic").unwrap();

        let codec = MockCodec::new();
        let dims = codec
            .transcode(&TranscodeParams {
                source: source.clone(),
                output: output.clone(),
                format: TargetFormat::WebP,
            })
            .unwrap();

        assert_eq!(dims.width, 4032);
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "encoded:WEBP");
        let ops = codec.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(
            &ops[0],
            RecordedOp::Transcode { format: TargetFormat::WebP, output: o, .. } if o.ends_with("out.webp")
        ));
    }

    #[test]
    fn mock_failing_reports_raw_text() {
        let codec = MockCodec::failing("boom");
        let err = codec.identify(Path::new("/x.heic")).unwrap_err();
        assert!(matches!(err, CodecError::Failed(m) if m == "boom"));
    }

    #[test]
    fn mock_unavailable_refuses_work() {
        let codec = MockCodec::unavailable();
        assert!(!codec.is_available());
        assert!(codec.version().is_none());
        assert!(matches!(
            codec.identify(Path::new("/x.heic")),
            Err(CodecError::Unavailable)
        ));
    }
}
