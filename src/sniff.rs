//! Upload type allow-list and MIME sniffing.
//!
//! An upload's type is decided from two signals, the way a CMS upload handler
//! does it:
//!
//! 1. The extension must be on the allow-list; its mapped MIME type is the
//!    starting answer. Unknown extensions are rejected outright.
//! 2. The first bytes of the file refine that answer. An ISO-BMFF `ftyp` box
//!    with a HEVC-coded HEIF brand means `image/heic`; any other raster signature
//!    `image` recognizes wins over the extension (a JPEG renamed to `.heic`
//!    is a JPEG). Unrecognized or unreadable content keeps the extension's type.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::naming::file_extension;

pub const HEIC_MIME: &str = "image/heic";

/// Brands of HEIF containers holding HEVC-coded images.
const HEIC_BRANDS: &[&[u8; 4]] = &[b"heic", b"heix", b"heim", b"heis", b"hevc", b"hevx"];

/// Generic HEIF brands. Shared with AVIF, so the compatible brands decide.
const GENERIC_HEIF_BRANDS: &[&[u8; 4]] = &[b"mif1", b"msf1"];

const AVIF_BRANDS: &[&[u8; 4]] = &[b"avif", b"avis"];

/// Bytes read for signature detection. Covers the `ftyp` box of real-world
/// HEIF files and every format `image` sniffs.
const SNIFF_LEN: usize = 64;

/// Extension → MIME type allow-list for uploads. Extensions are lowercase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTypes(BTreeMap<String, String>);

impl UploadTypes {
    /// The stock list of web image types, without HEIC.
    pub fn stock() -> Self {
        let entries = [
            ("jpg", "image/jpeg"),
            ("jpeg", "image/jpeg"),
            ("jpe", "image/jpeg"),
            ("gif", "image/gif"),
            ("png", "image/png"),
            ("bmp", "image/bmp"),
            ("tif", "image/tiff"),
            ("tiff", "image/tiff"),
            ("webp", "image/webp"),
            ("avif", "image/avif"),
            ("ico", "image/x-icon"),
        ];
        Self(
            entries
                .iter()
                .map(|(ext, mime)| (ext.to_string(), mime.to_string()))
                .collect(),
        )
    }

    /// Allow `.heic` uploads. An existing mapping is left untouched.
    pub fn allow_heic(&mut self) {
        self.0
            .entry("heic".to_string())
            .or_insert_with(|| HEIC_MIME.to_string());
    }

    /// MIME type mapped to the name's extension (compared case-insensitively).
    pub fn mime_for(&self, name: &str) -> Option<&str> {
        let ext = file_extension(name)?.to_ascii_lowercase();
        self.0.get(&ext).map(String::as_str)
    }

    pub fn is_allowed(&self, name: &str) -> bool {
        self.mime_for(name).is_some()
    }
}

impl Default for UploadTypes {
    fn default() -> Self {
        let mut types = Self::stock();
        types.allow_heic();
        types
    }
}

/// Whether the leading bytes are an ISO-BMFF `ftyp` box with a HEIC brand.
///
/// A HEVC major brand is enough. A generic `mif1`/`msf1` major brand needs a
/// HEVC brand among the compatible brands and no AVIF brand.
pub fn is_heic_signature(header: &[u8]) -> bool {
    if header.len() < 12 || &header[4..8] != b"ftyp" {
        return false;
    }
    let major = &header[8..12];
    let has = |set: &[&[u8; 4]], brand: &[u8]| set.iter().any(|b| brand == *b);
    if has(HEIC_BRANDS, major) {
        return true;
    }
    if !has(GENERIC_HEIF_BRANDS, major) {
        return false;
    }

    let box_len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
    let end = box_len.min(header.len()).max(16);
    let compatible: Vec<&[u8]> = header.get(16..end).unwrap_or(&[]).chunks_exact(4).collect();
    compatible.iter().any(|&b| has(HEIC_BRANDS, b))
        && !compatible.iter().any(|&b| has(AVIF_BRANDS, b))
}

fn read_header(path: &Path) -> Option<Vec<u8>> {
    let mut header = Vec::with_capacity(SNIFF_LEN);
    File::open(path)
        .ok()?
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut header)
        .ok()?;
    Some(header)
}

/// Determine the MIME type of an upload from its declared name and content.
///
/// Returns `None` when the extension is not allowed.
pub fn sniff_mime(path: &Path, name: &str, types: &UploadTypes) -> Option<String> {
    let declared = types.mime_for(name)?;
    let Some(header) = read_header(path) else {
        return Some(declared.to_string());
    };
    if is_heic_signature(&header) {
        return Some(HEIC_MIME.to_string());
    }
    match image::guess_format(&header) {
        Ok(format) => Some(format.to_mime_type().to_string()),
        Err(_) => Some(declared.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{HEIC_HEADER, write_heic};
    use tempfile::TempDir;

    #[test]
    fn stock_types_exclude_heic_until_allowed() {
        let mut types = UploadTypes::stock();
        assert!(!types.is_allowed("a.heic"));
        types.allow_heic();
        assert_eq!(types.mime_for("a.heic"), Some(HEIC_MIME));
    }

    #[test]
    fn allow_heic_keeps_existing_mapping() {
        let mut types = UploadTypes::stock();
        types.0.insert("heic".into(), "image/heif".into());
        types.allow_heic();
        assert_eq!(types.mime_for("a.heic"), Some("image/heif"));
    }

    #[test]
    fn extension_lookup_is_case_insensitive() {
        let types = UploadTypes::default();
        assert_eq!(types.mime_for("IMG_1.HEIC"), Some(HEIC_MIME));
        assert_eq!(types.mime_for("photo.JPG"), Some("image/jpeg"));
        assert_eq!(types.mime_for("script.php"), None);
    }

    #[test]
    fn heic_signature_detected() {
        assert!(is_heic_signature(HEIC_HEADER));
        assert!(!is_heic_signature(b"\0\0\0\x18ftypavif"));
        assert!(!is_heic_signature(b"short"));
    }

    #[test]
    fn generic_heif_brand_needs_hevc_compatible_brand() {
        assert!(is_heic_signature(b"\0\0\0\x18ftypmif1\0\0\0\0mif1heic"));
        assert!(!is_heic_signature(b"\0\0\0\x14ftypmif1\0\0\0\0mif1"));
    }

    #[test]
    fn avif_with_generic_heif_brand_is_not_heic() {
        let header = b"\0\0\0\x1cftypmif1\0\0\0\0mif1avifmiaf";
        assert!(!is_heic_signature(header));

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("upload.tmp");
        std::fs::write(&path, header).unwrap();
        let mime = sniff_mime(&path, "photo.avif", &UploadTypes::default());
        assert_eq!(mime.as_deref(), Some("image/avif"));
    }

    #[test]
    fn sniff_heic_content_with_heic_name() {
        let tmp = TempDir::new().unwrap();
        let path = write_heic(tmp.path(), "upload.tmp");
        let mime = sniff_mime(&path, "vacation.heic", &UploadTypes::default());
        assert_eq!(mime.as_deref(), Some(HEIC_MIME));
    }

    #[test]
    fn sniff_jpeg_content_renamed_to_heic() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("upload.tmp");
        std::fs::write(&path, [0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F', 0]).unwrap();
        let mime = sniff_mime(&path, "fake.heic", &UploadTypes::default());
        assert_eq!(mime.as_deref(), Some("image/jpeg"));
    }

    #[test]
    fn sniff_unrecognized_content_keeps_declared_type() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("upload.tmp");
        std::fs::write(&path, b"not really an image").unwrap();
        let mime = sniff_mime(&path, "vacation.heic", &UploadTypes::default());
        assert_eq!(mime.as_deref(), Some(HEIC_MIME));
    }

    #[test]
    fn sniff_disallowed_extension_is_none() {
        let tmp = TempDir::new().unwrap();
        let path = write_heic(tmp.path(), "upload.tmp");
        assert_eq!(sniff_mime(&path, "vacation.exe", &UploadTypes::default()), None);
    }

    #[test]
    fn sniff_missing_file_keeps_declared_type() {
        let mime = sniff_mime(
            Path::new("/nonexistent/upload"),
            "a.png",
            &UploadTypes::default(),
        );
        assert_eq!(mime.as_deref(), Some("image/png"));
    }
}
