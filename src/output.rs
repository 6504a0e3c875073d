//! CLI output formatting for every command.
//!
//! # Attachment Display Contract
//!
//! Attachments are shown by id and stored path, with conversion details as
//! indented context lines:
//!
//! ```text
//! vacation.heic → #1 2026/10/vacation.heic
//!     Copy: #2 2026/10/vacation.webp (4032x3024, 812345 bytes)
//! IMG_0002.heic → #3 2026/10/IMG_0002.jpg
//!     Replaced: jpeg (4032x3024, 1202311 bytes)
//! ```
//!
//! ## List
//!
//! ```text
//! #1 vacation (image/heic) 2026/10/vacation.heic 4032x3024
//!     Copy: #2
//! #2 vacation (image/webp) 2026/10/vacation.webp 4032x3024
//!     Copy of: #1
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::convert::{ConversionError, ConversionResult};
use crate::format::{ConversionConfig, ResolvedFormat};
use crate::host::UploadReport;
use crate::pipeline::{IngestOutcome, UploadOutcome};
use crate::selftest::{CleanupReport, Diagnostics, SelfTestOutcome, SelfTestReport};
use crate::store::MediaStore;
use crate::types::{Attachment, AttachmentId, AttachmentMetadata};

// ============================================================================
// Shared helpers
// ============================================================================

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn geometry(meta: &AttachmentMetadata) -> Option<String> {
    match (meta.width, meta.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => Some(format!("{w}x{h}")),
        _ => None,
    }
}

fn result_detail(result: &ConversionResult) -> String {
    format!(
        "{}x{}, {} bytes",
        result.dimensions.width, result.dimensions.height, result.output_size_bytes
    )
}

fn failure_line(error: &ConversionError) -> String {
    match error.diagnostic() {
        Some(diagnostic) => format!("{}Failed: {}", indent(1), diagnostic),
        None => format!("{}Failed: {}", indent(1), error),
    }
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}

// ============================================================================
// Upload / ingest
// ============================================================================

/// Lines describing the ingest stage's outcome for one attachment.
pub fn format_ingest_outcome(outcome: &IngestOutcome, store: &impl MediaStore) -> Vec<String> {
    match outcome {
        IngestOutcome::Skipped(_) => Vec::new(),
        IngestOutcome::Copied { copy, result } => {
            let file = store
                .attachment(*copy)
                .map(|a| a.file.as_str())
                .unwrap_or("?");
            vec![format!(
                "{}Copy: #{} {} ({})",
                indent(1),
                copy,
                file,
                result_detail(result)
            )]
        }
        IngestOutcome::Failed(error) => vec![failure_line(error)],
    }
}

/// Format the result of uploading one file.
pub fn format_upload_report(report: &UploadReport, store: &impl MediaStore) -> Vec<String> {
    let source = report
        .source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| report.source.display().to_string());
    let mut lines = vec![format!(
        "{} \u{2192} #{} {}",
        source, report.attachment, report.stored_as
    )];
    match &report.upload {
        UploadOutcome::Unchanged(_) => {}
        UploadOutcome::Replaced { result, .. } => lines.push(format!(
            "{}Replaced: {} ({})",
            indent(1),
            result.output_format,
            result_detail(result)
        )),
        UploadOutcome::Failed { error, .. } => lines.push(failure_line(error)),
    }
    lines.extend(format_ingest_outcome(&report.ingest, store));
    lines
}

pub fn print_upload_report(report: &UploadReport, store: &impl MediaStore) {
    print_lines(format_upload_report(report, store));
}

/// Format the result of re-running the ingest stage.
pub fn format_ingest_report(id: AttachmentId, outcome: &IngestOutcome, store: &impl MediaStore) -> Vec<String> {
    let mut lines = vec![format!("#{id}")];
    match outcome {
        IngestOutcome::Skipped(reason) => {
            lines.push(format!("{}Skipped: {}", indent(1), reason));
        }
        other => lines.extend(format_ingest_outcome(other, store)),
    }
    lines
}

pub fn print_ingest_report(id: AttachmentId, outcome: &IngestOutcome, store: &impl MediaStore) {
    print_lines(format_ingest_report(id, outcome, store));
}

// ============================================================================
// Library listing and metadata
// ============================================================================

/// Format the attachment list.
pub fn format_attachment_list(attachments: &[Attachment]) -> Vec<String> {
    if attachments.is_empty() {
        return vec!["Library is empty".to_string()];
    }
    let mut lines = Vec::new();
    for attachment in attachments {
        let mut header = format!(
            "#{} {} ({}) {}",
            attachment.id, attachment.title, attachment.mime_type, attachment.file
        );
        if let Some(geometry) = geometry(&attachment.meta) {
            header.push(' ');
            header.push_str(&geometry);
        }
        lines.push(header);

        if let Some(other) = attachment.copy_of {
            let is_derived = attachments
                .iter()
                .find(|a| a.id == other)
                .is_some_and(|a| a.id < attachment.id);
            let label = if is_derived { "Copy of" } else { "Copy" };
            lines.push(format!("{}{}: #{}", indent(1), label, other));
        }
    }
    lines
}

pub fn print_attachment_list(attachments: &[Attachment]) {
    print_lines(format_attachment_list(attachments));
}

/// Format an attachment's metadata after population.
pub fn format_metadata(id: AttachmentId, meta: &AttachmentMetadata) -> Vec<String> {
    let mut lines = vec![format!("#{id}")];
    lines.push(format!(
        "{}Geometry: {}",
        indent(1),
        geometry(meta).unwrap_or_else(|| "unknown".to_string())
    ));
    if let Some(file) = &meta.file {
        lines.push(format!("{}File: {}", indent(1), file));
    }
    if let Some(sizes) = &meta.sizes {
        lines.push(format!("{}Sizes: {}", indent(1), sizes.len()));
    }
    lines
}

pub fn print_metadata(id: AttachmentId, meta: &AttachmentMetadata) {
    print_lines(format_metadata(id, meta));
}

// ============================================================================
// Settings
// ============================================================================

/// Format stored conversion settings and what they resolve to.
pub fn format_settings(config: &ConversionConfig, resolved: &ResolvedFormat) -> Vec<String> {
    vec![
        format!("format = {}", config.target_format),
        format!("replace = {}", config.replace_original),
        format!(
            "{}Output: .{} ({}, {})",
            indent(1),
            resolved.extension,
            resolved.format,
            resolved.mime_type
        ),
    ]
}

pub fn print_settings(config: &ConversionConfig, resolved: &ResolvedFormat) {
    print_lines(format_settings(config, resolved));
}

// ============================================================================
// Self-test, diagnostics, cleanup
// ============================================================================

pub fn format_self_test(report: &SelfTestReport) -> Vec<String> {
    let status = match report.outcome {
        SelfTestOutcome::Succeeded => "ok",
        SelfTestOutcome::CodecMissing => "codec missing",
        SelfTestOutcome::HeicUnsupported => "HEIC unsupported",
        SelfTestOutcome::SampleMissing => "sample missing",
        SelfTestOutcome::Failed => "failed",
    };
    let mut lines = vec![format!("Self-test: {status}")];
    if let Some(version) = &report.version {
        lines.push(format!("{}Version: {}", indent(1), version));
    }
    if let Some(output) = &report.sample_output {
        lines.push(format!("{}Output: {}", indent(1), output.display()));
    }
    lines.push(format!("{}{}", indent(1), report.message));
    lines
}

pub fn print_self_test(report: &SelfTestReport) {
    print_lines(format_self_test(report));
}

pub fn format_diagnostics(diagnostics: &Diagnostics) -> Vec<String> {
    let binary = diagnostics
        .binary
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "not found".to_string());
    let heic = match diagnostics.heic_support {
        Some(true) => "yes",
        Some(false) => "no",
        None => "unknown",
    };
    let mut lines = vec![
        format!("Codec: {binary}"),
        format!(
            "{}Version: {}",
            indent(1),
            diagnostics.version.as_deref().unwrap_or("unknown")
        ),
        format!("{}HEIC support: {heic}", indent(1)),
    ];
    if let Some(problem) = diagnostics.problem() {
        lines.push(format!("{}{}", indent(1), problem));
    }
    lines
}

pub fn print_diagnostics(diagnostics: &Diagnostics) {
    print_lines(format_diagnostics(diagnostics));
}

pub fn format_cleanup(report: &CleanupReport) -> Vec<String> {
    let mut lines: Vec<String> = report
        .removed
        .iter()
        .map(|p| format!("Removed {}", p.display()))
        .collect();
    lines.push(format!(
        "Cleaned up {} self-test file{} and stored options",
        report.removed.len(),
        if report.removed.len() == 1 { "" } else { "s" }
    ));
    lines
}

pub fn print_cleanup(report: &CleanupReport) {
    print_lines(format_cleanup(report));
}
