//! # heic-ingest
//!
//! Accepts HEIC image uploads into a media library and produces web-friendly
//! WebP or JPEG versions of them. All decoding and encoding is delegated to
//! ImageMagick; this crate decides *whether* to convert, *what* to produce,
//! *where* to put it, and how the result is tied back to the original.
//!
//! # Architecture: Named Pipeline Stages
//!
//! A host (the bundled file-backed [`library`], or any other media store)
//! calls three stages at its own events:
//!
//! ```text
//! upload ──► on_upload ──► store ──► on_ingested ──► on_metadata_requested
//!            (replace)               (copy + link)   (HEIC geometry)
//! ```
//!
//! Each stage is built from small pieces:
//!
//! ```text
//! Eligibility Filter → Format Resolver → Conversion Executor → Linkage Recorder
//! ```
//!
//! The same conversion path runs synchronously as a self-test against a
//! sample image supplied by the operator.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`pipeline`] | The three stages and their outcomes |
//! | [`eligibility`] | Whether conversion applies to an upload or a stored file |
//! | [`format`] | Target format, settings, and override resolution |
//! | [`convert`] | Conversion executor: copy mode and in-place replacement |
//! | [`linkage`] | Mutual `copy_of` links between originals and copies |
//! | [`metadata`] | Geometry population for HEIC attachments |
//! | [`selftest`] | Self-test harness, diagnostics, uninstall cleanup |
//! | [`codec`] | ImageMagick behind the [`codec::Codec`] trait |
//! | [`store`] | Host seams: [`store::OptionStore`] and [`store::MediaStore`] |
//! | [`library`] | File-backed media library (`.library.json`) |
//! | [`host`] | Upload flow: stage → upload stage → store → ingest → metadata |
//! | [`sniff`] | Upload type allow-list and content sniffing |
//! | [`config`] | `config.toml` loading, merging, validation |
//! | [`naming`] | Derived and unique filenames |
//! | [`types`] | Attachments, upload candidates, metadata |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Skips, Not Failures
//!
//! A missing codec, a codec without HEIC support, or an unreadable file never
//! fails an upload. The original is stored as uploaded and the reason comes
//! back as an outcome. Only the `diagnostics` and `self-test` commands explain
//! such problems to the operator.
//!
//! ## Capability Probe First
//!
//! ImageMagick is asked (`-list format`) whether it can read HEIC before any
//! decode is attempted. Error text is only interpreted as a fallback, in one
//! place: [`codec::classify_codec_error`].
//!
//! ## Settings Loaded Once
//!
//! The stored [`format::ConversionConfig`] is read once per command and
//! passed by value into the [`pipeline::Pipeline`], so every stage of one
//! request sees the same settings.

pub mod codec;
pub mod config;
pub mod convert;
pub mod eligibility;
pub mod format;
pub mod host;
pub mod library;
pub mod linkage;
pub mod metadata;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod selftest;
pub mod sniff;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
