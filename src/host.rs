//! Host-side flows: the order in which a media library calls the pipeline.
//!
//! An upload goes through the same steps a CMS runs:
//!
//! 1. **Stage**: copy the file into the library's staging area.
//! 2. **Upload stage**: [`Pipeline::on_upload`] may replace it with a
//!    converted file (replace mode).
//! 3. **Store**: the library checks the type, moves the file into the
//!    uploads directory and creates the attachment.
//! 4. **Ingest stage**: [`Pipeline::on_ingested`] may create a linked copy
//!    (copy mode).
//! 5. **Metadata**: [`Pipeline::on_metadata_requested`] fills HEIC geometry.
//!
//! The library does not decode images itself, so files written by the codec
//! (a replaced upload, a converted copy) get their geometry from the
//! conversion result.

use crate::codec::{Codec, Dimensions};
use crate::library::{Library, LibraryError};
use crate::pipeline::{IngestOutcome, Pipeline, UploadOutcome};
use crate::store::{MediaStore, StoreError};
use crate::types::{AttachmentId, AttachmentMetadata};
use std::path::{Path, PathBuf};

/// Everything that happened to one uploaded file.
#[derive(Debug)]
pub struct UploadReport {
    pub source: PathBuf,
    pub attachment: AttachmentId,
    /// Stored path, relative to the uploads directory.
    pub stored_as: String,
    pub upload: UploadOutcome,
    pub ingest: IngestOutcome,
}

/// Run one local file through the full upload flow.
pub fn upload_file<C: Codec>(
    pipeline: &Pipeline<'_, C>,
    library: &mut Library,
    source: &Path,
) -> Result<UploadReport, LibraryError> {
    let staged = library.stage_upload(source)?;
    let upload = pipeline.on_upload(staged, library.upload_types());

    let id = match library.accept_upload(upload.candidate()) {
        Ok(id) => id,
        Err(e) => {
            // Rejected uploads do not stay in staging.
            let _ = std::fs::remove_file(&upload.candidate().temp_path);
            return Err(e);
        }
    };
    if let UploadOutcome::Replaced { result, .. } = &upload {
        set_geometry(library, id, result.dimensions)?;
    }

    let ingest = ingest_attachment(pipeline, library, id)?;
    refresh_metadata(pipeline, library, id)?;

    let stored_as = library
        .attachment(id)
        .map(|a| a.file.clone())
        .ok_or(StoreError::UnknownAttachment(id))?;
    Ok(UploadReport {
        source: source.to_path_buf(),
        attachment: id,
        stored_as,
        upload,
        ingest,
    })
}

/// Run the ingest stage for a stored attachment and record the copy's geometry.
pub fn ingest_attachment<C: Codec>(
    pipeline: &Pipeline<'_, C>,
    library: &mut Library,
    id: AttachmentId,
) -> Result<IngestOutcome, LibraryError> {
    let outcome = pipeline.on_ingested(library, id);
    if let IngestOutcome::Copied { copy, result } = &outcome {
        set_geometry(library, *copy, result.dimensions)?;
    }
    Ok(outcome)
}

/// Populate and store missing metadata for an attachment.
pub fn refresh_metadata<C: Codec>(
    pipeline: &Pipeline<'_, C>,
    library: &mut Library,
    id: AttachmentId,
) -> Result<AttachmentMetadata, LibraryError> {
    let current = library
        .attachment(id)
        .map(|a| a.meta.clone())
        .ok_or(StoreError::UnknownAttachment(id))?;
    let meta = pipeline.on_metadata_requested(library, id, current);
    library.set_metadata(id, meta.clone())?;
    Ok(meta)
}

fn set_geometry(
    library: &mut Library,
    id: AttachmentId,
    dimensions: Dimensions,
) -> Result<(), StoreError> {
    let attachment = library
        .attachment(id)
        .ok_or(StoreError::UnknownAttachment(id))?;
    let meta = AttachmentMetadata {
        width: Some(dimensions.width),
        height: Some(dimensions.height),
        file: Some(attachment.file.clone()),
        sizes: Some(Default::default()),
    };
    library.set_metadata(id, meta)
}
