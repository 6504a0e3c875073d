//! Original ↔ converted-copy linkage.
//!
//! In copy mode the original and its converted copy each carry a `copy_of`
//! attribute naming the other. The pair is always mutual or entirely absent:
//! if the second write fails, the first is rolled back.

use crate::store::{MediaStore, StoreError};
use crate::types::AttachmentId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LinkageError {
    #[error("an attachment cannot be a copy of itself ({0})")]
    SelfLink(AttachmentId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Link `original` and `copy` to each other.
pub fn record_linkage(
    store: &mut impl MediaStore,
    original: AttachmentId,
    copy: AttachmentId,
) -> Result<(), LinkageError> {
    if original == copy {
        return Err(LinkageError::SelfLink(original));
    }
    for id in [original, copy] {
        if store.attachment(id).is_none() {
            return Err(StoreError::UnknownAttachment(id).into());
        }
    }

    // A previous partner pointing back at `original` would be left one-sided.
    let stale = store
        .attachment(original)
        .and_then(|a| a.copy_of)
        .filter(|&prev| prev != copy && linked_copy(&*store, original) == Some(prev));
    if let Some(prev) = stale {
        store.set_copy_of(prev, None)?;
    }

    let previous = store.attachment(original).and_then(|a| a.copy_of);
    store.set_copy_of(original, Some(copy))?;
    if let Err(e) = store.set_copy_of(copy, Some(original)) {
        store.set_copy_of(original, previous)?;
        if let Some(prev) = stale {
            store.set_copy_of(prev, Some(original))?;
        }
        return Err(e.into());
    }
    tracing::debug!(%original, %copy, "linked converted copy");
    Ok(())
}

/// The attachment linked to `id`, if the link is mutual.
pub fn linked_copy(store: &impl MediaStore, id: AttachmentId) -> Option<AttachmentId> {
    let other = store.attachment(id)?.copy_of?;
    (store.attachment(other)?.copy_of == Some(id)).then_some(other)
}
