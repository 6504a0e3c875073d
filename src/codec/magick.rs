//! ImageMagick codec, driven through its command-line tools.
//!
//! ## Command mapping
//!
//! | Operation | Invocation |
//! |---|---|
//! | Version | `magick -version` (first line) |
//! | Capability probe | `magick -list format` (mode column contains `r`) |
//! | Transcode | `magick <source>[0] <FORMAT>:<output>` |
//! | Identify | `magick <source>[0] -format "%w %h" info:` |
//!
//! ImageMagick 7 ships a single `magick` binary; ImageMagick 6 installs the
//! same front end as `convert`. Both accept every invocation above, so the
//! binary found first on `PATH` is used as-is.
//!
//! The explicit output prefix (`WEBP:`, `JPEG:`) pins the encoder regardless
//! of the output file's extension, which matters in replace mode where the
//! output is the upload's extension-less temporary file.

use super::backend::{Codec, CodecError, Dimensions};
use super::params::TranscodeParams;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

/// Front-end binaries to look for on `PATH`, in preference order.
const CANDIDATE_BINARIES: &[&str] = &["magick", "convert"];

/// ImageMagick backend.
///
/// See the [module docs](self) for the command mapping.
#[derive(Debug)]
pub struct MagickCodec {
    binary: Option<PathBuf>,
    capability_probe: bool,
    /// `-list format` output, fetched once per process.
    format_list: OnceLock<Option<String>>,
}

impl MagickCodec {
    fn new(binary: Option<PathBuf>) -> Self {
        Self {
            binary,
            capability_probe: true,
            format_list: OnceLock::new(),
        }
    }

    /// Find `magick` (or `convert`) on `PATH`. The codec is unavailable when
    /// neither exists.
    pub fn locate() -> Self {
        let binary = CANDIDATE_BINARIES
            .iter()
            .find_map(|name| which::which(name).ok());
        Self::new(binary)
    }

    /// Use an explicit binary. A bare name like `magick` is looked up on
    /// `PATH`; anything with a directory part is used as given.
    pub fn with_binary(path: PathBuf) -> Self {
        let bare = path.components().count() == 1 && !path.is_absolute();
        let resolved = if bare {
            which::which(&path).unwrap_or(path)
        } else {
            path
        };
        Self::new(Some(resolved))
    }

    /// Disable the `-list format` probe; HEIC support is then only discovered
    /// by attempting a decode.
    pub fn with_capability_probe(mut self, enabled: bool) -> Self {
        self.capability_probe = enabled;
        self
    }

    pub fn binary(&self) -> Option<&Path> {
        self.binary.as_deref()
    }

    /// Run the front end with `args`, returning stdout on success and the
    /// codec's stderr text on failure.
    fn run<I, S>(&self, args: I) -> Result<String, CodecError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let binary = self.binary.as_ref().ok_or(CodecError::Unavailable)?;
        let output = Command::new(binary).args(args).output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CodecError::Unavailable
            } else {
                CodecError::Io(e)
            }
        })?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(CodecError::Failed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }

    fn format_list(&self) -> Option<&str> {
        self.format_list
            .get_or_init(|| self.run(["-list", "format"]).ok())
            .as_deref()
    }
}

/// Select the primary image of a (possibly multi-image) container.
fn first_frame(path: &Path) -> OsString {
    let mut arg = path.as_os_str().to_os_string();
    arg.push("[0]");
    arg
}

/// `WEBP:/path/to/out`: forces the encoder independent of the extension.
fn prefixed_output(format: &str, path: &Path) -> OsString {
    let mut arg = OsString::from(format);
    arg.push(":");
    arg.push(path.as_os_str());
    arg
}

/// Extract the version string from `-version` output.
///
/// `Version: ImageMagick 7.1.1-15 Q16-HDRI x86_64 21298 https://imagemagick.org`
/// becomes `ImageMagick 7.1.1-15 Q16-HDRI x86_64 21298`.
fn parse_version(output: &str) -> Option<String> {
    let line = output.lines().next()?.trim();
    let line = line.strip_prefix("Version:").unwrap_or(line).trim();
    let line = match line.find(" http") {
        Some(idx) => &line[..idx],
        None => line,
    };
    if line.is_empty() {
        None
    } else {
        Some(line.to_string())
    }
}

/// Whether `-list format` output lists `format` with a readable mode.
///
/// Rows look like `     HEIC  HEIC      rw+   High Efficiency Image Format`.
/// A trailing `*` on the name marks a native blob; it is ignored. An empty
/// listing means the probe told us nothing.
fn parse_format_support(list: &str, format: &str) -> Option<bool> {
    if list.trim().is_empty() {
        return None;
    }
    for line in list.lines() {
        let mut columns = line.split_whitespace();
        let (Some(name), Some(_module), Some(mode)) =
            (columns.next(), columns.next(), columns.next())
        else {
            continue;
        };
        if name.trim_end_matches('*').eq_ignore_ascii_case(format) {
            return Some(mode.contains('r'));
        }
    }
    Some(false)
}

/// Parse `"<width> <height>"` as printed by `-format "%w %h"`.
fn parse_geometry(output: &str) -> Option<Dimensions> {
    let mut parts = output.split_whitespace();
    let width = parts.next()?.parse().ok()?;
    let height = parts.next()?.parse().ok()?;
    Some(Dimensions { width, height })
}

impl Codec for MagickCodec {
    fn is_available(&self) -> bool {
        self.binary.as_ref().is_some_and(|b| b.is_file())
    }

    fn version(&self) -> Option<String> {
        if !self.is_available() {
            return None;
        }
        self.run(["-version"]).ok().as_deref().and_then(parse_version)
    }

    fn supports_decode(&self, format: &str) -> Option<bool> {
        if !self.capability_probe || !self.is_available() {
            return None;
        }
        parse_format_support(self.format_list()?, format)
    }

    fn transcode(&self, params: &TranscodeParams) -> Result<Dimensions, CodecError> {
        let format = params.format.codec_name();
        self.run([
            first_frame(&params.source),
            prefixed_output(format, &params.output),
        ])?;
        // Reading the header of the encoded output is cheaper than a second
        // codec round-trip; fall back to identify for anything `image` can't sniff.
        match image::image_dimensions(&params.output) {
            Ok((width, height)) => Ok(Dimensions { width, height }),
            Err(_) => self.identify(&params.output),
        }
    }

    fn identify(&self, path: &Path) -> Result<Dimensions, CodecError> {
        let stdout = self.run([
            first_frame(path),
            OsString::from("-format"),
            OsString::from("%w %h"),
            OsString::from("info:"),
        ])?;
        parse_geometry(&stdout).ok_or_else(|| {
            CodecError::Failed(format!(
                "unexpected identify output for {}: {}",
                path.display(),
                stdout.trim()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::TargetFormat;

    const LIST_FORMAT: &str = "   Format  Mode  Description
-------------------------------------------------------------------------------
      AVIF  HEIC      rw+   AV1 Image File Format (1.17.6)
      HEIC  HEIC      rw+   High Efficiency Image Format (1.17.6)
      JPEG* JPEG      rw-   Joint Photographic Experts Group JFIF format (80)
      WEBP* WEBP      rw+   WebP Image Format (libwebp 1.3.2 [020F])
";

    #[test]
    fn parse_version_strips_prefix_and_url() {
        let out = "Version: ImageMagick 7.1.1-15 Q16-HDRI x86_64 21298 https://imagemagick.org\nCopyright: (C) 1999 ImageMagick Studio LLC\n";
        assert_eq!(
            parse_version(out).as_deref(),
            Some("ImageMagick 7.1.1-15 Q16-HDRI x86_64 21298")
        );
    }

    #[test]
    fn parse_version_legacy_format() {
        let out = "Version: ImageMagick 6.9.11-60 Q16 x86_64 2021-01-25 https://imagemagick.org\n";
        assert_eq!(
            parse_version(out).as_deref(),
            Some("ImageMagick 6.9.11-60 Q16 x86_64 2021-01-25")
        );
    }

    #[test]
    fn parse_version_empty_is_none() {
        assert_eq!(parse_version(""), None);
        assert_eq!(parse_version("Version:\n"), None);
    }

    #[test]
    fn format_support_reads_mode_column() {
        assert_eq!(parse_format_support(LIST_FORMAT, "HEIC"), Some(true));
        assert_eq!(parse_format_support(LIST_FORMAT, "heic"), Some(true));
        assert_eq!(parse_format_support(LIST_FORMAT, "WEBP"), Some(true));
    }

    #[test]
    fn format_support_write_only_is_not_readable() {
        let list = "      HEIC  HEIC      -w+   High Efficiency Image Format\n";
        assert_eq!(parse_format_support(list, "HEIC"), Some(false));
    }

    #[test]
    fn format_support_missing_row_is_unsupported() {
        let list = "      JPEG* JPEG      rw-   Joint Photographic Experts Group\n";
        assert_eq!(parse_format_support(list, "HEIC"), Some(false));
    }

    #[test]
    fn format_support_empty_listing_is_unknown() {
        assert_eq!(parse_format_support("", "HEIC"), None);
    }

    #[test]
    fn parse_geometry_reads_width_and_height() {
        assert_eq!(
            parse_geometry("4032 3024"),
            Some(Dimensions {
                width: 4032,
                height: 3024
            })
        );
        assert_eq!(parse_geometry("garbage"), None);
        assert_eq!(parse_geometry("12"), None);
    }

    #[test]
    fn prefixed_output_pins_encoder() {
        let arg = prefixed_output("WEBP", Path::new("/tmp/phpA1b2"));
        assert_eq!(arg, OsString::from("WEBP:/tmp/phpA1b2"));
    }

    #[test]
    fn first_frame_appends_selector() {
        assert_eq!(
            first_frame(Path::new("/u/IMG_0001.heic")),
            OsString::from("/u/IMG_0001.heic[0]")
        );
    }

    #[test]
    fn missing_binary_is_unavailable() {
        let codec = MagickCodec::with_binary("/nonexistent/bin/magick".into());
        assert!(!codec.is_available());
        assert_eq!(codec.version(), None);
        assert_eq!(codec.supports_decode("HEIC"), None);

        let err = codec
            .transcode(&TranscodeParams {
                source: "/nonexistent/a.heic".into(),
                output: "/nonexistent/a.webp".into(),
                format: TargetFormat::WebP,
            })
            .unwrap_err();
        assert!(matches!(err, CodecError::Unavailable));
    }

    #[test]
    fn bare_binary_name_is_resolved_on_path() {
        let codec = MagickCodec::with_binary("sh".into());
        assert!(codec.binary().unwrap().is_absolute());
        assert!(codec.is_available());

        let codec = MagickCodec::with_binary("no-such-magick-binary".into());
        assert_eq!(codec.binary(), Some(Path::new("no-such-magick-binary")));
        assert!(!codec.is_available());
    }

    #[test]
    fn probe_disabled_reports_unknown() {
        let codec = MagickCodec::with_binary("/nonexistent/bin/magick".into())
            .with_capability_probe(false);
        assert_eq!(codec.supports_decode("HEIC"), None);
    }
}
