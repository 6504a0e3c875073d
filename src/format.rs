//! Target format resolution.
//!
//! The codec's format name (`JPEG`), the filename extension (`jpg`) and the
//! MIME type (`image/jpeg`) are three separate things. [`resolve_format`]
//! derives all three from the stored [`ConversionConfig`], then applies any
//! [`FormatOverrides`] from `config.toml`, each one independently:
//!
//! | Stored format | Format | Extension | MIME type |
//! |---|---|---|---|
//! | unset | `webp` | `webp` | `image/webp` |
//! | `webp` | `webp` | `webp` | `image/webp` |
//! | `jpeg` | `jpeg` | `jpg` | `image/jpeg` |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Output formats HEIC images can be converted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    #[default]
    WebP,
    Jpeg,
}

impl TargetFormat {
    /// Lowercase name, as stored in the option store and used in MIME types.
    pub fn name(self) -> &'static str {
        match self {
            Self::WebP => "webp",
            Self::Jpeg => "jpeg",
        }
    }

    /// Encoder name understood by the codec.
    pub fn codec_name(self) -> &'static str {
        match self {
            Self::WebP => "WEBP",
            Self::Jpeg => "JPEG",
        }
    }

    pub fn default_extension(self) -> &'static str {
        match self {
            Self::WebP => "webp",
            Self::Jpeg => "jpg",
        }
    }

    pub fn mime_type(self) -> String {
        format!("image/{}", self.name())
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown format '{0}' (expected webp or jpeg)")]
pub struct UnknownFormat(pub String);

impl FromStr for TargetFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "webp" => Ok(Self::WebP),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            _ => Err(UnknownFormat(s.to_string())),
        }
    }
}

/// Conversion settings, read from the option store once per request and
/// passed by value from there on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConversionConfig {
    pub target_format: TargetFormat,
    /// Replace HEIC uploads before they are stored instead of creating copies.
    pub replace_original: bool,
}

impl ConversionConfig {
    /// Build from raw stored option values. Missing or unrecognized formats
    /// fall back to WebP.
    pub fn from_stored(format: Option<&str>, replace: Option<bool>) -> Self {
        let target_format = match format.map(str::trim).filter(|f| !f.is_empty()) {
            Some(raw) => raw.parse().unwrap_or_else(|e: UnknownFormat| {
                tracing::warn!("{e}; falling back to webp");
                TargetFormat::WebP
            }),
            None => TargetFormat::WebP,
        };
        Self {
            target_format,
            replace_original: replace.unwrap_or(false),
        }
    }
}

/// Parse an on/off option value: `1/true/on/yes` or `0/false/off/no`
/// (case-insensitive). Anything else is `None`.
pub fn parse_switch(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" | "" => Some(false),
        _ => None,
    }
}

/// Independent overrides for the resolved format, extension and MIME type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FormatOverrides {
    /// Encode with this format regardless of the stored setting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<TargetFormat>,
    /// Filename extension for derived files, without the leading dot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    /// MIME type reported for replaced uploads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Fully resolved output: what to ask the codec for and how to name the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFormat {
    pub format: TargetFormat,
    pub extension: String,
    pub mime_type: String,
}

/// Resolve the output format. Never fails.
pub fn resolve_format(config: &ConversionConfig, overrides: &FormatOverrides) -> ResolvedFormat {
    let format = overrides.format.unwrap_or(config.target_format);
    let extension = overrides
        .extension
        .as_deref()
        .map(|e| e.trim_start_matches('.'))
        .filter(|e| !e.is_empty())
        .unwrap_or(format.default_extension())
        .to_string();
    let mime_type = overrides
        .mime_type
        .clone()
        .unwrap_or_else(|| format.mime_type());
    ResolvedFormat {
        format,
        extension,
        mime_type,
    }
}
