//! Host seams: the option store and the media store.
//!
//! The pipeline never touches the library manifest directly. It reads
//! conversion settings through [`OptionStore`] and reads/writes attachments
//! through [`MediaStore`], so a different host (a database, a CMS) only has to
//! implement these two traits. [`Library`](crate::library::Library) is the
//! file-backed implementation used by the CLI.

use crate::format::ConversionConfig;
use crate::types::{Attachment, AttachmentId, AttachmentMetadata};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("no attachment with id {0}")]
    UnknownAttachment(AttachmentId),
    #[error("file does not exist: {}", .0.display())]
    MissingFile(PathBuf),
    #[error("file is outside the uploads directory: {}", .0.display())]
    OutsideUploads(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Persistent plugin options.
pub trait OptionStore {
    /// Conversion settings as stored, with defaults applied.
    fn conversion_config(&self) -> ConversionConfig;

    /// Path of the last self-test output, if one is recorded.
    fn self_test_slot(&self) -> Option<PathBuf>;

    /// Record (or clear) the self-test output path.
    fn set_self_test_slot(&mut self, path: Option<PathBuf>);

    /// Remove every option this tool owns.
    fn clear_options(&mut self);
}

/// Attachment storage.
pub trait MediaStore {
    /// Absolute uploads directory. Attachment files are relative to it.
    fn uploads_root(&self) -> &Path;

    /// Directory new files are written to (may be a dated subdirectory).
    fn upload_dir(&self) -> PathBuf;

    fn attachment(&self, id: AttachmentId) -> Option<&Attachment>;

    /// Whether `path` is the file of some attachment.
    fn is_attached(&self, path: &Path) -> bool;

    /// Absolute path of an attachment's file.
    fn attached_file(&self, id: AttachmentId) -> Option<PathBuf> {
        self.attachment(id)
            .map(|a| self.uploads_root().join(&a.file))
    }

    /// Set or clear the `copy_of` attribute of one attachment.
    fn set_copy_of(
        &mut self,
        id: AttachmentId,
        copy_of: Option<AttachmentId>,
    ) -> Result<(), StoreError>;

    /// Register a file already written under the uploads directory as a new
    /// attachment.
    fn ingest_derived(&mut self, path: &Path, title: &str) -> Result<AttachmentId, StoreError>;

    fn set_metadata(
        &mut self,
        id: AttachmentId,
        meta: AttachmentMetadata,
    ) -> Result<(), StoreError>;

    /// Path relative to the uploads directory, `/`-separated.
    ///
    /// `None` when `path` is not under the uploads directory.
    fn relative_file(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(self.uploads_root()).ok()?;
        let parts: Vec<&str> = rel
            .components()
            .map(|c| match c {
                Component::Normal(part) => part.to_str(),
                _ => None,
            })
            .collect::<Option<_>>()?;
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("/"))
        }
    }
}
