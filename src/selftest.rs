//! Operator self-test and uninstall cleanup.
//!
//! The self-test runs the same conversion path as an upload, synchronously,
//! against a sample image the operator places in the library. It answers the
//! question operators actually have: "will HEIC uploads work on this server?"
//!
//! Each run writes `heic-support-image4-<timestamp>.<ext>` into the current
//! upload directory and records its path in the option store. The previous
//! run's file is deleted first, so at most one self-test output exists.

use crate::codec::Codec;
use crate::convert::{ConversionError, HEIC_CODEC_NAME, UNSUPPORTED_HEIC_MESSAGE, convert};
use crate::format::ResolvedFormat;
use crate::naming::unique_filename;
use crate::store::{MediaStore, OptionStore};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Filename prefix of every self-test output.
pub const SELF_TEST_PREFIX: &str = "heic-support-image4";

pub const CODEC_MISSING_MESSAGE: &str = "ImageMagick is not installed on this server. \
     HEIC conversion only works on servers running ImageMagick. Some hosts require \
     a switch be flipped before the program is available to a site.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelfTestOutcome {
    /// No usable codec binary.
    CodecMissing,
    /// Codec present, but it cannot decode HEIC.
    HeicUnsupported,
    /// No sample image where the config says.
    SampleMissing,
    /// Conversion failed for another reason.
    Failed,
    Succeeded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelfTestReport {
    pub outcome: SelfTestOutcome,
    pub message: String,
    pub version: Option<String>,
    pub sample_output: Option<PathBuf>,
}

impl SelfTestReport {
    fn new(outcome: SelfTestOutcome, message: String, version: Option<String>) -> Self {
        Self {
            outcome,
            message,
            version,
            sample_output: None,
        }
    }
}

/// Convert the sample image and report whether HEIC conversion works.
pub fn run_self_test<S>(
    codec: &impl Codec,
    store: &mut S,
    sample: &Path,
    resolved: &ResolvedFormat,
) -> SelfTestReport
where
    S: MediaStore + OptionStore,
{
    let version = codec.version();
    if !codec.is_available() {
        return SelfTestReport::new(
            SelfTestOutcome::CodecMissing,
            CODEC_MISSING_MESSAGE.to_string(),
            None,
        );
    }
    if !sample.is_file() {
        return SelfTestReport::new(
            SelfTestOutcome::SampleMissing,
            format!(
                "Sample image not found: {} (copy any HEIC photo there, or set self_test.sample)",
                sample.display()
            ),
            version,
        );
    }

    if let Some(previous) = store.self_test_slot() {
        match remove_if_exists(&previous) {
            Ok(()) => tracing::debug!(path = %previous.display(), "removed previous self-test output"),
            Err(e) => tracing::warn!(path = %previous.display(), error = %e, "could not remove previous self-test output"),
        }
        store.set_self_test_slot(None);
    }

    let dir = store.upload_dir();
    if let Err(e) = fs::create_dir_all(&dir) {
        return SelfTestReport::new(SelfTestOutcome::Failed, e.to_string(), version);
    }
    let stamp = chrono::Local::now().format("%Y%m%d%H%M%S");
    let name = format!("{SELF_TEST_PREFIX}-{stamp}.{}", resolved.extension);
    let output = dir.join(unique_filename(&dir, &name));

    match convert(codec, sample, &output, resolved) {
        Ok(result) => {
            store.set_self_test_slot(Some(result.output_path.clone()));
            SelfTestReport {
                outcome: SelfTestOutcome::Succeeded,
                message: format!(
                    "This server can convert .heic images. If the output does not display, \
                     your browser may not support .{}.",
                    resolved.extension
                ),
                version,
                sample_output: Some(result.output_path),
            }
        }
        Err(ConversionError::CodecUnavailable) => SelfTestReport::new(
            SelfTestOutcome::CodecMissing,
            CODEC_MISSING_MESSAGE.to_string(),
            None,
        ),
        Err(e @ ConversionError::UnsupportedSourceFormat { .. }) => SelfTestReport::new(
            SelfTestOutcome::HeicUnsupported,
            e.diagnostic()
                .unwrap_or_else(|| UNSUPPORTED_HEIC_MESSAGE.to_string()),
            version,
        ),
        Err(e) => {
            tracing::warn!(error = %e, "self-test conversion failed");
            SelfTestReport::new(SelfTestOutcome::Failed, e.to_string(), version)
        }
    }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Codec facts shown by the diagnostics command.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostics {
    pub binary: Option<PathBuf>,
    pub available: bool,
    pub version: Option<String>,
    /// `None` when the codec cannot be asked.
    pub heic_support: Option<bool>,
}

impl Diagnostics {
    /// Operator explanation for a codec that is missing or lacks HEIC support.
    pub fn problem(&self) -> Option<String> {
        if !self.available {
            return Some(CODEC_MISSING_MESSAGE.to_string());
        }
        (self.heic_support == Some(false)).then(|| {
            format!(
                "{} Installed version is {}",
                UNSUPPORTED_HEIC_MESSAGE,
                self.version.as_deref().unwrap_or("unknown")
            )
        })
    }
}

/// Collect codec diagnostics without converting anything.
pub fn diagnose(codec: &impl Codec, binary: Option<&Path>) -> Diagnostics {
    let available = codec.is_available();
    Diagnostics {
        binary: binary.map(Path::to_path_buf),
        available,
        version: available.then(|| codec.version()).flatten(),
        heic_support: if available {
            codec.supports_decode(HEIC_CODEC_NAME)
        } else {
            None
        },
    }
}

/// Files removed by [`cleanup`].
#[derive(Debug, Default, PartialEq)]
pub struct CleanupReport {
    pub removed: Vec<PathBuf>,
}

/// Whether `name` is a self-test output name: `heic-support-image4.<ext>` or
/// `heic-support-image4-<YYYYmmddHHMMSS>[-N].<ext>`.
fn is_self_test_output(name: &str) -> bool {
    let Some(rest) = name.strip_prefix(SELF_TEST_PREFIX) else {
        return false;
    };
    let Some((stem, ext)) = rest.rsplit_once('.') else {
        return false;
    };
    if ext.is_empty() || !ext.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return false;
    }
    if stem.is_empty() {
        return true;
    }
    let Some(stamped) = stem.strip_prefix('-') else {
        return false;
    };
    let (stamp, counter) = stamped.split_once('-').unwrap_or((stamped, "1"));
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    stamp.len() == 14 && digits(stamp) && digits(counter)
}

/// Uninstall cleanup for one site: delete every self-test output under the
/// uploads directory and remove all stored options. Files belonging to an
/// attachment are never removed.
pub fn cleanup<S>(store: &mut S) -> io::Result<CleanupReport>
where
    S: MediaStore + OptionStore,
{
    let mut targets: Vec<PathBuf> = store.self_test_slot().into_iter().collect();
    if store.uploads_root().is_dir() {
        for entry in WalkDir::new(store.uploads_root())
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let is_self_test = entry.file_name().to_str().is_some_and(is_self_test_output);
            if is_self_test && !targets.iter().any(|t| t == entry.path()) {
                targets.push(entry.path().to_path_buf());
            }
        }
    }

    let mut report = CleanupReport::default();
    for path in targets {
        if store.is_attached(&path) {
            tracing::warn!(path = %path.display(), "not removing attached file");
            continue;
        }
        if path.exists() {
            fs::remove_file(&path)?;
            report.removed.push(path);
        }
    }
    store.clear_options();
    tracing::info!(removed = report.removed.len(), "cleanup complete");
    Ok(report)
}
