//! Tool configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! serialized from [`Settings::default`] and the user's file is merged on top,
//! so the file only needs the keys it changes.
//!
//! ## Config File Location
//!
//! `config.toml` lives in the configuration directory (`--config`,
//! default: the current directory). Relative paths inside it are resolved
//! against that directory.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [library]
//! root = "media"            # Library root (holds .library.json)
//! uploads = "uploads"       # Uploads directory, relative to the library root
//! organize_by_month = true  # Store uploads under uploads/YYYY/MM
//!
//! [codec]
//! # binary = "/usr/bin/magick"  # Omit to search PATH for magick, then convert
//! capability_probe = true       # Ask the codec for HEIC support before decoding
//!
//! [self_test]
//! sample = "assets/image4.heic" # Self-test sample you supply, relative to the library root
//!
//! [overrides]
//! # format = "jpeg"             # Ignore the stored format setting
//! # extension = "jpeg"          # Extension for derived files
//! # mime_type = "image/jpeg"    # MIME type reported for replaced uploads
//! ```
//!
//! The conversion settings an operator changes day to day (target format,
//! replace mode) are not here: they live in the library's option store and
//! are edited with `heic-ingest settings set`.
//!
//! Unknown keys are rejected to catch typos early.

use crate::format::FormatOverrides;
use crate::sniff::UploadTypes;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Tool configuration loaded from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Where the media library and its uploads live.
    pub library: LibrarySettings,
    /// Which codec binary to drive and how to probe it.
    pub codec: CodecSettings,
    /// Self-test sample location.
    pub self_test: SelfTestSettings,
    /// Independent overrides for the resolved format, extension and MIME type.
    pub overrides: FormatOverrides,
}

impl Settings {
    /// Validate config values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.library.root.trim().is_empty() {
            return Err(ConfigError::Validation(
                "library.root must not be empty".into(),
            ));
        }
        let uploads = Path::new(&self.library.uploads);
        if self.library.uploads.trim().is_empty()
            || uploads.is_absolute()
            || uploads.components().any(|c| c == Component::ParentDir)
        {
            return Err(ConfigError::Validation(
                "library.uploads must be a relative path inside the library root".into(),
            ));
        }
        if let Some(ext) = &self.overrides.extension {
            let ext = ext.trim_start_matches('.');
            if ext.is_empty() || ext.contains(['/', '\\', '.']) {
                return Err(ConfigError::Validation(format!(
                    "overrides.extension '{ext}' is not a valid file extension"
                )));
            }
            // Replaced uploads must still pass the upload allow-list.
            if !UploadTypes::default().is_allowed(&format!("upload.{ext}")) {
                return Err(ConfigError::Validation(format!(
                    "overrides.extension '{ext}' is not an allowed upload type"
                )));
            }
        }
        if let Some(mime) = &self.overrides.mime_type
            && !mime.contains('/')
        {
            return Err(ConfigError::Validation(format!(
                "overrides.mime_type '{mime}' is not a MIME type"
            )));
        }
        Ok(())
    }

    /// Library root, resolved against the config directory.
    pub fn library_root(&self, config_dir: &Path) -> PathBuf {
        config_dir.join(&self.library.root)
    }

    /// Self-test sample, resolved against the library root.
    pub fn sample_path(&self, config_dir: &Path) -> PathBuf {
        self.library_root(config_dir).join(&self.self_test.sample)
    }
}

/// Media library location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LibrarySettings {
    /// Library root directory. Relative paths resolve against the config directory.
    pub root: String,
    /// Uploads directory, relative to the library root.
    pub uploads: String,
    /// Store new uploads under `uploads/YYYY/MM`.
    pub organize_by_month: bool,
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            root: "media".to_string(),
            uploads: "uploads".to_string(),
            organize_by_month: true,
        }
    }
}

/// Codec binary selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodecSettings {
    /// Explicit ImageMagick front end. When absent, `magick` then `convert`
    /// are looked up on `PATH`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary: Option<PathBuf>,
    /// Query `-list format` for HEIC support before attempting a decode.
    pub capability_probe: bool,
}

impl Default for CodecSettings {
    fn default() -> Self {
        Self {
            binary: None,
            capability_probe: true,
        }
    }
}

/// Self-test settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SelfTestSettings {
    /// Sample HEIC image, relative to the library root.
    pub sample: String,
}

impl Default for SelfTestSettings {
    fn default() -> Self {
        Self {
            sample: "assets/image4.heic".to_string(),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(Settings::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no `config.toml` exists in the directory.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join("config.toml");
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<Settings, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: Settings = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given directory.
pub fn load_config(dir: &Path) -> Result<Settings, ConfigError> {
    resolve_config(stock_defaults_value(), load_raw_config(dir)?)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# heic-ingest Configuration
# =========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.
#
# The target format and replace mode are stored in the library itself;
# change them with `heic-ingest settings set format jpeg` and
# `heic-ingest settings set replace true`.

# ---------------------------------------------------------------------------
# Media library
# ---------------------------------------------------------------------------
[library]
# Library root. Holds .library.json and the uploads directory.
# Relative paths resolve against the directory holding this file.
root = "media"

# Uploads directory, relative to the library root.
uploads = "uploads"

# Store new uploads under uploads/YYYY/MM.
organize_by_month = true

# ---------------------------------------------------------------------------
# Codec (ImageMagick)
# ---------------------------------------------------------------------------
[codec]
# Explicit path to `magick` (ImageMagick 7) or `convert` (ImageMagick 6).
# A bare name such as "convert" is looked up on PATH.
# Omit to search PATH for magick, then convert.
# binary = "/usr/bin/magick"

# Ask ImageMagick (`-list format`) whether it can read HEIC before trying.
# When false, missing HEIC support is only detected from decode errors.
capability_probe = true

# ---------------------------------------------------------------------------
# Self-test
# ---------------------------------------------------------------------------
[self_test]
# Sample HEIC image converted by `heic-ingest self-test`, relative to the
# library root. No sample ships with heic-ingest: copy any HEIC photo here
# before running the self-test.
sample = "assets/image4.heic"

# ---------------------------------------------------------------------------
# Overrides
# ---------------------------------------------------------------------------
# Each key overrides one part of the resolved output, independently.
[overrides]
# Encode with this format regardless of the stored setting ("webp" or "jpeg").
# format = "jpeg"

# Extension for derived files. JPEG output uses "jpg" unless overridden.
# Must be an allowed upload type (jpg, jpeg, jpe, png, webp, ...).
# extension = "jpeg"

# MIME type reported for uploads replaced in place.
# mime_type = "image/jpeg"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::TargetFormat;
    use tempfile::TempDir;

    #[test]
    fn default_settings() {
        let config = Settings::default();
        assert_eq!(config.library.root, "media");
        assert_eq!(config.library.uploads, "uploads");
        assert!(config.library.organize_by_month);
        assert!(config.codec.binary.is_none());
        assert!(config.codec.capability_probe);
        assert_eq!(config.self_test.sample, "assets/image4.heic");
        assert_eq!(config.overrides, FormatOverrides::default());
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[library]
organize_by_month = false
"#;
        let config: Settings = toml::from_str(toml).unwrap();
        assert!(!config.library.organize_by_month);
        assert_eq!(config.library.root, "media");
        assert!(config.codec.capability_probe);
    }

    #[test]
    fn parse_overrides() {
        let toml = r#"
[overrides]
format = "jpeg"
extension = "jpeg"
"#;
        let config: Settings = toml::from_str(toml).unwrap();
        assert_eq!(config.overrides.format, Some(TargetFormat::Jpeg));
        assert_eq!(config.overrides.extension.as_deref(), Some("jpeg"));
        assert_eq!(config.overrides.mime_type, None);
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.library.root, "media");
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("config.toml"),
            r#"
[codec]
binary = "/opt/im7/bin/magick"
capability_probe = false
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(
            config.codec.binary.as_deref(),
            Some(Path::new("/opt/im7/bin/magick"))
        );
        assert!(!config.codec.capability_probe);
        assert_eq!(config.self_test.sample, "assets/image4.heic");
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("config.toml"), "this is not valid toml [[[").unwrap();
        assert!(matches!(load_config(tmp.path()), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn stock_config_toml_parses_to_defaults() {
        let config: Settings = toml::from_str(stock_config_toml()).unwrap();
        let defaults = Settings::default();
        assert_eq!(config.library.root, defaults.library.root);
        assert_eq!(config.library.uploads, defaults.library.uploads);
        assert_eq!(config.self_test.sample, defaults.self_test.sample);
        assert_eq!(config.overrides, defaults.overrides);
    }

    #[test]
    fn paths_resolve_against_config_dir() {
        let config = Settings::default();
        let dir = Path::new("/srv/site");
        assert_eq!(config.library_root(dir), Path::new("/srv/site/media"));
        assert_eq!(
            config.sample_path(dir),
            Path::new("/srv/site/media/assets/image4.heic")
        );
    }

    // =========================================================================
    // Merging
    // =========================================================================

    #[test]
    fn merge_toml_preserves_base_keys() {
        let base = stock_defaults_value();
        let overlay: toml::Value = toml::from_str("[library]\nroot = \"/data\"").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["library"]["root"].as_str(), Some("/data"));
        assert_eq!(merged["library"]["uploads"].as_str(), Some("uploads"));
        assert_eq!(merged["codec"]["capability_probe"].as_bool(), Some(true));
    }

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str("a = 1").unwrap();
        let overlay: toml::Value = toml::from_str("a = 2").unwrap();
        assert_eq!(merge_toml(base, overlay)["a"].as_integer(), Some(2));
    }

    // =========================================================================
    // Unknown keys and validation
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let result: Result<Settings, _> = toml::from_str("unknown_key = 1");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_nested_key_rejected() {
        let result: Result<Settings, _> = toml::from_str("[codec]\nbinray = \"x\"");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_override_format_rejected() {
        let result: Result<Settings, _> = toml::from_str("[overrides]\nformat = \"gif\"");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_key_rejected_via_load_config() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("config.toml"), "[self_test]\nsampel = \"x\"").unwrap();
        assert!(load_config(tmp.path()).is_err());
    }

    #[test]
    fn validate_rejects_escaping_uploads_dir() {
        let mut config = Settings::default();
        config.library.uploads = "../elsewhere".into();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        config.library.uploads = "/abs/uploads".into();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_rejects_bad_extension_override() {
        let mut config = Settings::default();
        config.overrides.extension = Some("a/b".into());
        assert!(config.validate().is_err());

        config.overrides.extension = Some(".".into());
        assert!(config.validate().is_err());

        config.overrides.extension = Some(".jpeg".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_extension_outside_upload_types() {
        let mut config = Settings::default();
        config.overrides.extension = Some("jfif".into());
        let Err(ConfigError::Validation(msg)) = config.validate() else {
            panic!("expected a validation error");
        };
        assert!(msg.contains("jfif"));

        config.overrides.extension = Some("WEBP".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_mime_override() {
        let mut config = Settings::default();
        config.overrides.mime_type = Some("jpeg".into());
        assert!(config.validate().is_err());
    }
}
