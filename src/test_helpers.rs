//! Shared test utilities for the heic-ingest test suite.
//!
//! Provides HEIC fixture files, upload candidates, and a ready-to-use library
//! rooted in a temp directory.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let (tmp, mut library) = setup_library();
//! let candidate = heic_candidate(tmp.path(), "vacation.heic");
//! let id = library.accept_upload(&candidate).unwrap();
//! ```

use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::config::LibrarySettings;
use crate::library::Library;
use crate::types::UploadCandidate;

// =========================================================================
// HEIC fixtures
// =========================================================================

/// Leading bytes of an iPhone HEIC file: an `ftyp` box with the `heic` brand.
pub const HEIC_HEADER: &[u8] = b"\0\0\0\x18ftypheic\0\0\0\0mif1heic";

/// Write a file that sniffs as HEIC and return its path.
pub fn write_heic(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let mut bytes = HEIC_HEADER.to_vec();
    bytes.extend_from_slice(b"\0\0\0\x08mdat");
    std::fs::write(&path, bytes).unwrap();
    path
}

/// An upload candidate for a HEIC file staged under `dir/tmp/`.
///
/// The temp file gets an opaque name the way upload handlers stage files,
/// so only `name` carries the extension.
pub fn heic_candidate(dir: &Path, name: &str) -> UploadCandidate {
    let temp_path = write_heic(&dir.join("tmp"), &format!("upload-{name}.part"));
    let size = std::fs::metadata(&temp_path).unwrap().len();
    UploadCandidate {
        temp_path,
        name: name.to_string(),
        mime_type: Some("image/heic".to_string()),
        size,
    }
}

// =========================================================================
// Library setup
// =========================================================================

/// Library settings with flat uploads, so stored paths are predictable.
pub fn flat_library_settings() -> LibrarySettings {
    LibrarySettings {
        organize_by_month: false,
        ..LibrarySettings::default()
    }
}

/// An empty library rooted at `<tmp>/media`, uploads at `<tmp>/media/uploads`.
pub fn setup_library() -> (TempDir, Library) {
    let tmp = TempDir::new().unwrap();
    let library = Library::open(&tmp.path().join("media"), &flat_library_settings()).unwrap();
    (tmp, library)
}
