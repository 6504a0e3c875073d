//! Parameter types for codec operations.
//!
//! These describe *what* to produce, not *how*. The policy modules build them;
//! the [`backend`](super::backend) executes them. Swapping the backend for a
//! mock in tests changes nothing on the policy side.

use crate::format::TargetFormat;
use std::path::PathBuf;

/// Full specification for a transcode: source, destination, and target format.
///
/// `output` may equal `source` (replace mode writes over the upload in place).
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub format: TargetFormat,
}
