//! The conversion pipeline: named stages a host calls at its own events.
//!
//! ```text
//! upload received ──► on_upload ──► (host stores file) ──► on_ingested ──► on_metadata_requested
//!                     replace mode                        copy mode
//!                     convert in place                    convert + ingest + link
//! ```
//!
//! - [`Pipeline::on_upload`] runs before the host stores an upload. In
//!   replace mode an eligible HEIC is converted in place and the candidate
//!   comes back describing the converted file, so the `.heic` never reaches
//!   the library.
//! - [`Pipeline::on_ingested`] runs after an attachment is stored. In copy
//!   mode an eligible HEIC gets a converted sibling, registered as its own
//!   attachment and linked to the original.
//! - [`Pipeline::on_metadata_requested`] fills in geometry the host could not
//!   read from a HEIC file.
//!
//! A pipeline holds the [`ConversionConfig`] loaded once at the request
//! boundary. No stage fails the host operation: conversion problems come back
//! as outcomes, and the original upload or attachment is kept as it was.

use crate::codec::Codec;
use crate::convert::{ConversionError, ConversionResult, convert_copy, convert_upload};
use crate::eligibility::{ingest_eligible, is_heic_file, upload_eligible};
use crate::format::{ConversionConfig, FormatOverrides, ResolvedFormat, resolve_format};
use crate::linkage::{linked_copy, record_linkage};
use crate::metadata::populate_metadata;
use crate::sniff::UploadTypes;
use crate::store::MediaStore;
use crate::types::{AttachmentId, AttachmentMetadata, UploadCandidate};
use std::fmt;

/// Result of the upload stage.
#[derive(Debug)]
pub enum UploadOutcome {
    /// Not eligible; store as uploaded.
    Unchanged(UploadCandidate),
    /// Converted in place; store the returned candidate instead.
    Replaced {
        candidate: UploadCandidate,
        result: ConversionResult,
    },
    /// Eligible, but conversion failed; store as uploaded.
    Failed {
        candidate: UploadCandidate,
        error: ConversionError,
    },
}

impl UploadOutcome {
    /// The candidate the host should store.
    pub fn candidate(&self) -> &UploadCandidate {
        match self {
            Self::Unchanged(candidate)
            | Self::Replaced { candidate, .. }
            | Self::Failed { candidate, .. } => candidate,
        }
    }

    pub fn into_candidate(self) -> UploadCandidate {
        match self {
            Self::Unchanged(candidate)
            | Self::Replaced { candidate, .. }
            | Self::Failed { candidate, .. } => candidate,
        }
    }
}

/// Why the ingest stage did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    UnknownAttachment,
    /// Replace mode converts at upload time; copies are never made.
    ReplaceMode,
    NotHeic,
    /// The attachment already has a linked converted copy.
    AlreadyConverted,
    CodecUnavailable,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::UnknownAttachment => "unknown attachment",
            Self::ReplaceMode => "replace mode is enabled",
            Self::NotHeic => "not a .heic file",
            Self::AlreadyConverted => "a converted copy already exists",
            Self::CodecUnavailable => "codec is not available",
        };
        f.write_str(text)
    }
}

/// Result of the ingest stage.
#[derive(Debug)]
pub enum IngestOutcome {
    Skipped(SkipReason),
    /// A converted copy was created, ingested and linked.
    Copied {
        copy: AttachmentId,
        result: ConversionResult,
    },
    Failed(ConversionError),
}

/// Conversion stages bound to one request's configuration.
pub struct Pipeline<'a, C: Codec> {
    codec: &'a C,
    config: ConversionConfig,
    resolved: ResolvedFormat,
}

impl<'a, C: Codec> Pipeline<'a, C> {
    pub fn new(codec: &'a C, config: ConversionConfig, overrides: &FormatOverrides) -> Self {
        Self {
            codec,
            config,
            resolved: resolve_format(&config, overrides),
        }
    }

    pub fn config(&self) -> ConversionConfig {
        self.config
    }

    pub fn resolved(&self) -> &ResolvedFormat {
        &self.resolved
    }

    /// Replace-mode interception, before the upload is stored.
    pub fn on_upload(&self, candidate: UploadCandidate, types: &UploadTypes) -> UploadOutcome {
        if !upload_eligible(self.codec, &candidate, &self.config, types) {
            tracing::debug!(name = %candidate.name, "upload not eligible for replacement");
            return UploadOutcome::Unchanged(candidate);
        }
        match convert_upload(self.codec, &candidate, &self.resolved) {
            Ok((converted, result)) => {
                tracing::info!(from = %candidate.name, to = %converted.name, "replaced HEIC upload");
                UploadOutcome::Replaced {
                    candidate: converted,
                    result,
                }
            }
            Err(error) => {
                log_failure(&candidate.name, &error);
                UploadOutcome::Failed { candidate, error }
            }
        }
    }

    /// Copy-mode conversion, after an attachment is stored.
    pub fn on_ingested(&self, store: &mut impl MediaStore, id: AttachmentId) -> IngestOutcome {
        let skip = |reason: SkipReason| {
            tracing::debug!(%id, %reason, "skipping ingest conversion");
            IngestOutcome::Skipped(reason)
        };
        if self.config.replace_original {
            return skip(SkipReason::ReplaceMode);
        }
        let (Some(path), Some(title)) = (
            store.attached_file(id),
            store.attachment(id).map(|a| a.title.clone()),
        ) else {
            return skip(SkipReason::UnknownAttachment);
        };
        if !is_heic_file(&path) {
            return skip(SkipReason::NotHeic);
        }
        if linked_copy(&*store, id).is_some() {
            return skip(SkipReason::AlreadyConverted);
        }
        if !ingest_eligible(self.codec, &path) {
            return skip(SkipReason::CodecUnavailable);
        }

        let result = match convert_copy(self.codec, &path, &self.resolved) {
            Ok(result) => result,
            Err(error) => {
                log_failure(&path.display().to_string(), &error);
                return IngestOutcome::Failed(error);
            }
        };

        let ingested = match store.ingest_derived(&result.output_path, &title) {
            Ok(copy) => record_linkage(store, id, copy)
                .map(|()| copy)
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        match ingested {
            Ok(copy) => IngestOutcome::Copied { copy, result },
            Err(reason) => {
                let error = ConversionError::DerivedIngestFailed {
                    path: result.output_path,
                    reason,
                };
                tracing::warn!(%id, "{error}; derived file left in place");
                IngestOutcome::Failed(error)
            }
        }
    }

    /// Fill missing geometry for a HEIC attachment. Unknown attachments and
    /// non-HEIC files return `meta` unchanged.
    pub fn on_metadata_requested(
        &self,
        store: &impl MediaStore,
        id: AttachmentId,
        meta: AttachmentMetadata,
    ) -> AttachmentMetadata {
        match (store.attached_file(id), store.attachment(id)) {
            (Some(path), Some(attachment)) => {
                populate_metadata(self.codec, &path, &attachment.file, meta)
            }
            _ => meta,
        }
    }
}

fn log_failure(subject: &str, error: &ConversionError) {
    match error {
        ConversionError::Codec(_) | ConversionError::Io(_) => {
            tracing::warn!(subject, %error, "HEIC conversion failed")
        }
        _ => tracing::debug!(subject, %error, "HEIC conversion skipped"),
    }
}
