//! File-backed media library.
//!
//! The library is a directory holding an uploads tree and a JSON manifest:
//!
//! ```text
//! media/
//! ├── .library.json        # options + attachments
//! ├── .staging/            # uploads waiting to be accepted
//! └── uploads/
//!     └── 2026/10/
//!         ├── vacation.heic
//!         └── vacation.webp
//! ```
//!
//! Unlike a build cache, the manifest holds user data: a missing manifest is
//! an empty library, but a corrupt one or one written by a newer version is
//! an error rather than a silent reset.
//!
//! The manifest is loaded once per CLI invocation and saved once at the end,
//! so all read-modify-write state (self-test slot, linkage pairs) is updated
//! under a single load/save.

use crate::config::LibrarySettings;
use crate::format::{ConversionConfig, TargetFormat};
use crate::naming::{basename, split_extension, unique_filename};
use crate::sniff::{UploadTypes, sniff_mime};
use crate::store::{MediaStore, OptionStore, StoreError};
use crate::types::{Attachment, AttachmentId, AttachmentMetadata, UploadCandidate};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the manifest file within the library root.
const MANIFEST_FILENAME: &str = ".library.json";

/// Staging directory for uploads that have not been accepted yet.
const STAGING_DIR: &str = ".staging";

/// Version of the manifest format.
const MANIFEST_VERSION: u32 = 1;

const FALLBACK_MIME: &str = "application/octet-stream";

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("library manifest is corrupt: {0}")]
    Json(#[from] serde_json::Error),
    #[error("library manifest version {found} is not supported by this build")]
    UnsupportedVersion { found: u32 },
    #[error("file type is not allowed: {0}")]
    DisallowedType(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Raw option values as stored. Interpreted by [`OptionStore`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoredOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replace: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_test_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Manifest {
    version: u32,
    next_id: u64,
    #[serde(default)]
    options: StoredOptions,
    #[serde(default)]
    attachments: Vec<Attachment>,
}

impl Manifest {
    fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            next_id: 1,
            options: StoredOptions::default(),
            attachments: Vec::new(),
        }
    }
}

/// The media library rooted at a directory.
#[derive(Debug)]
pub struct Library {
    root: PathBuf,
    uploads: PathBuf,
    organize_by_month: bool,
    upload_types: UploadTypes,
    manifest: Manifest,
}

impl Library {
    /// Open the library at `root`. A missing manifest yields an empty library.
    ///
    /// Uploads start from the stock type list; call
    /// [`allow_heic_uploads`](Self::allow_heic_uploads) to accept HEIC.
    pub fn open(root: &Path, settings: &LibrarySettings) -> Result<Self, LibraryError> {
        let path = root.join(MANIFEST_FILENAME);
        let manifest = if path.exists() {
            let manifest: Manifest = serde_json::from_str(&fs::read_to_string(&path)?)?;
            if manifest.version != MANIFEST_VERSION {
                return Err(LibraryError::UnsupportedVersion {
                    found: manifest.version,
                });
            }
            manifest
        } else {
            Manifest::empty()
        };
        Ok(Self {
            root: root.to_path_buf(),
            uploads: root.join(&settings.uploads),
            organize_by_month: settings.organize_by_month,
            upload_types: UploadTypes::stock(),
            manifest,
        })
    }

    /// Write the manifest, creating the library root if needed.
    pub fn save(&self) -> Result<(), LibraryError> {
        fs::create_dir_all(&self.root)?;
        let json = serde_json::to_string_pretty(&self.manifest)?;
        fs::write(self.root.join(MANIFEST_FILENAME), json)?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn upload_types(&self) -> &UploadTypes {
        &self.upload_types
    }

    /// Add `heic → image/heic` to the allowed upload types.
    pub fn allow_heic_uploads(&mut self) {
        self.upload_types.allow_heic();
    }

    /// All attachments in id order.
    pub fn attachments(&self) -> &[Attachment] {
        &self.manifest.attachments
    }

    pub fn stored_options(&self) -> &StoredOptions {
        &self.manifest.options
    }

    pub fn set_format(&mut self, format: TargetFormat) {
        self.manifest.options.format = Some(format.name().to_string());
    }

    pub fn set_replace(&mut self, replace: bool) {
        self.manifest.options.replace = Some(replace);
    }

    /// Copy a local file into the staging area, the way an upload handler
    /// receives it. The source file is left alone.
    pub fn stage_upload(&self, source: &Path) -> Result<UploadCandidate, LibraryError> {
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| LibraryError::DisallowedType(source.display().to_string()))?
            .to_string();
        let staging = self.root.join(STAGING_DIR);
        fs::create_dir_all(&staging)?;
        let temp_path = staging.join(unique_filename(&staging, &format!("{name}.part")));
        let size = fs::copy(source, &temp_path)?;
        Ok(UploadCandidate {
            temp_path,
            mime_type: self.upload_types.mime_for(&name).map(str::to_string),
            name,
            size,
        })
    }

    /// Store an upload: check its type, move it into the upload directory
    /// under a unique name, and create the attachment.
    pub fn accept_upload(
        &mut self,
        candidate: &UploadCandidate,
    ) -> Result<AttachmentId, LibraryError> {
        let sniffed = sniff_mime(&candidate.temp_path, &candidate.name, &self.upload_types)
            .ok_or_else(|| LibraryError::DisallowedType(candidate.name.clone()))?;

        let dir = self.upload_dir();
        fs::create_dir_all(&dir)?;
        let dest = dir.join(unique_filename(&dir, basename(&candidate.name)));
        move_file(&candidate.temp_path, &dest)?;

        let file = self
            .relative_file(&dest)
            .ok_or_else(|| StoreError::OutsideUploads(dest.clone()))?;
        let mime_type = candidate.mime_type.clone().unwrap_or(sniffed);
        let id = self.insert(file, title_for(&candidate.name), mime_type);
        tracing::debug!(%id, path = %dest.display(), "stored upload");
        Ok(id)
    }

    fn insert(&mut self, file: String, title: String, mime_type: String) -> AttachmentId {
        let id = AttachmentId(self.manifest.next_id);
        self.manifest.next_id += 1;
        self.manifest.attachments.push(Attachment {
            id,
            file,
            title,
            mime_type,
            copy_of: None,
            meta: AttachmentMetadata::default(),
        });
        id
    }

    fn attachment_mut(&mut self, id: AttachmentId) -> Result<&mut Attachment, StoreError> {
        self.manifest
            .attachments
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(StoreError::UnknownAttachment(id))
    }
}

/// Rename, falling back to copy + remove across filesystems.
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)?;
    fs::remove_file(from)
}

/// Attachment title: the file's stem.
fn title_for(name: &str) -> String {
    split_extension(name).0.to_string()
}

impl OptionStore for Library {
    fn conversion_config(&self) -> ConversionConfig {
        let options = &self.manifest.options;
        ConversionConfig::from_stored(options.format.as_deref(), options.replace)
    }

    fn self_test_slot(&self) -> Option<PathBuf> {
        self.manifest.options.self_test_path.clone()
    }

    fn set_self_test_slot(&mut self, path: Option<PathBuf>) {
        self.manifest.options.self_test_path = path;
    }

    fn clear_options(&mut self) {
        self.manifest.options = StoredOptions::default();
    }
}

impl MediaStore for Library {
    fn uploads_root(&self) -> &Path {
        &self.uploads
    }

    /// `uploads/YYYY/MM` or `uploads/`.
    fn upload_dir(&self) -> PathBuf {
        if self.organize_by_month {
            self.uploads
                .join(chrono::Local::now().format("%Y/%m").to_string())
        } else {
            self.uploads.clone()
        }
    }

    fn attachment(&self, id: AttachmentId) -> Option<&Attachment> {
        self.manifest.attachments.iter().find(|a| a.id == id)
    }

    fn is_attached(&self, path: &Path) -> bool {
        self.relative_file(path)
            .is_some_and(|file| self.manifest.attachments.iter().any(|a| a.file == file))
    }

    fn set_copy_of(
        &mut self,
        id: AttachmentId,
        copy_of: Option<AttachmentId>,
    ) -> Result<(), StoreError> {
        self.attachment_mut(id)?.copy_of = copy_of;
        Ok(())
    }

    fn ingest_derived(&mut self, path: &Path, title: &str) -> Result<AttachmentId, StoreError> {
        if !path.is_file() {
            return Err(StoreError::MissingFile(path.to_path_buf()));
        }
        let file = self
            .relative_file(path)
            .ok_or_else(|| StoreError::OutsideUploads(path.to_path_buf()))?;
        let mime_type = self
            .upload_types
            .mime_for(&file)
            .unwrap_or(FALLBACK_MIME)
            .to_string();
        Ok(self.insert(file, title.to_string(), mime_type))
    }

    fn set_metadata(
        &mut self,
        id: AttachmentId,
        meta: AttachmentMetadata,
    ) -> Result<(), StoreError> {
        self.attachment_mut(id)?.meta = meta;
        Ok(())
    }
}
