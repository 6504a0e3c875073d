//! Filename rules for derived and stored files.
//!
//! Derived files keep the original's basename and swap the extension:
//! `IMG_0001.heic` → `IMG_0001.webp`. Only a lowercase `.heic` suffix is
//! stripped; `IMG_0001.HEIC` keeps its suffix and becomes
//! `IMG_0001.HEIC.webp`. Existing files are never overwritten: a colliding
//! name gets a numeric suffix (`IMG_0001-1.webp`, `IMG_0001-2.webp`, ...).

use std::path::Path;

/// Suffix stripped from source names when deriving a new name.
const HEIC_SUFFIX: &str = ".heic";

/// Final component of a slash-separated name, like `basename(1)`.
pub fn basename(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// Strip a trailing `.heic` from a basename.
///
/// The name `.heic` itself is left alone so a derived name is never empty.
pub fn strip_heic_suffix(name: &str) -> &str {
    let base = basename(name);
    match base.strip_suffix(HEIC_SUFFIX) {
        Some(stem) if !stem.is_empty() => stem,
        _ => base,
    }
}

/// `<basename without .heic>.<extension>`.
pub fn derived_filename(name: &str, extension: &str) -> String {
    format!("{}.{}", strip_heic_suffix(name), extension)
}

/// Extension of a filename (text after the last dot of the basename).
///
/// Case is preserved: callers decide whether to compare case-sensitively.
pub fn file_extension(name: &str) -> Option<&str> {
    let base = basename(name);
    let (stem, ext) = base.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        None
    } else {
        Some(ext)
    }
}

/// Split a basename into stem and optional extension.
///
/// - `"vacation.heic"` → `("vacation", Some("heic"))`
/// - `"archive.tar.gz"` → `("archive.tar", Some("gz"))`
/// - `".hidden"` → `(".hidden", None)`
pub fn split_extension(name: &str) -> (&str, Option<&str>) {
    let base = basename(name);
    match file_extension(base) {
        Some(ext) => (&base[..base.len() - ext.len() - 1], Some(ext)),
        None => (base, None),
    }
}

/// Return `name` if nothing by that name exists in `dir`, otherwise the first
/// free `<stem>-N.<ext>` with N counting up from 1.
pub fn unique_filename(dir: &Path, name: &str) -> String {
    let name = basename(name);
    if !dir.join(name).exists() {
        return name.to_string();
    }
    let (stem, ext) = split_extension(name);
    (1u32..)
        .map(|n| match ext {
            Some(ext) => format!("{stem}-{n}.{ext}"),
            None => format!("{stem}-{n}"),
        })
        .find(|candidate| !dir.join(candidate).exists())
        .unwrap_or_else(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn derived_name_swaps_heic_extension() {
        assert_eq!(derived_filename("vacation.heic", "webp"), "vacation.webp");
        assert_eq!(derived_filename("vacation.heic", "jpg"), "vacation.jpg");
    }

    #[test]
    fn derived_name_uses_basename_of_path() {
        assert_eq!(
            derived_filename("2026/10/IMG_0042.heic", "webp"),
            "IMG_0042.webp"
        );
    }

    #[test]
    fn uppercase_suffix_is_not_stripped() {
        assert_eq!(derived_filename("IMG_0001.HEIC", "webp"), "IMG_0001.HEIC.webp");
    }

    #[test]
    fn bare_suffix_is_not_stripped() {
        assert_eq!(strip_heic_suffix(".heic"), ".heic");
    }

    #[test]
    fn file_extension_cases() {
        assert_eq!(file_extension("a.heic"), Some("heic"));
        assert_eq!(file_extension("dir.v2/a.HEIC"), Some("HEIC"));
        assert_eq!(file_extension("noext"), None);
        assert_eq!(file_extension(".heic"), None);
        assert_eq!(file_extension("trailing."), None);
    }

    #[test]
    fn split_extension_cases() {
        assert_eq!(split_extension("vacation.heic"), ("vacation", Some("heic")));
        assert_eq!(split_extension("archive.tar.gz"), ("archive.tar", Some("gz")));
        assert_eq!(split_extension(".hidden"), (".hidden", None));
    }

    #[test]
    fn unique_filename_free_name_unchanged() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(unique_filename(tmp.path(), "vacation.webp"), "vacation.webp");
    }

    #[test]
    fn unique_filename_counts_up() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("vacation.webp"), "a").unwrap();
        assert_eq!(unique_filename(tmp.path(), "vacation.webp"), "vacation-1.webp");

        fs::write(tmp.path().join("vacation-1.webp"), "b").unwrap();
        assert_eq!(unique_filename(tmp.path(), "vacation.webp"), "vacation-2.webp");
    }

    #[test]
    fn unique_filename_without_extension() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("README"), "a").unwrap();
        assert_eq!(unique_filename(tmp.path(), "README"), "README-1");
    }
}
