//! # scribe-extract
//!
//! Plain-text recovery from uploaded meeting transcripts.
//!
//! Every upload goes through the same pipeline: the [`ExtractorRegistry`]
//! picks an extractor from the declared MIME type (or the filename extension
//! when the MIME type is missing or generic), the extractor recovers text,
//! and the readability check decides whether that text is worth handing to
//! downstream processing. Failures are values, never panics or errors: each
//! call returns an [`ExtractionResult`](scribe_core::ExtractionResult).
//!
//! ## Supported Formats
//!
//! | Extractor | Formats | Strategy |
//! |-----------|---------|----------|
//! | [`TextExtractor`] | `.txt`, `.md`, `.vtt`, `.srt` | Lossy UTF-8, BOM-aware |
//! | [`PdfExtractor`] | `.pdf` | lopdf, then a literal-string cascade |
//! | [`DocxExtractor`] | `.docx` | `word/document.xml`, then an XML-run cascade |
//!
//! ## Usage
//!
//! ```rust,ignore
//! use scribe_core::ExtractionRequest;
//!
//! let request = ExtractionRequest::new(bytes)
//!     .with_mime_type("application/pdf")
//!     .with_file_name("standup.pdf");
//!
//! let result = scribe_extract::extract_validated(&request);
//! if result.succeeded {
//!     println!("{} pages: {}", result.page_count.unwrap_or(0), result.text);
//! }
//! ```
//!
//! ## Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ExtractorRegistry`] | Routes uploads to extractors, applies limits and validation |
//! | [`Cascade`] | Ordered heuristic fallback stages |
//! | [`ReadabilityCheck`] | Readable-character ratio gate |
//! | [`ExtractConfig`] | Parser mode, size ceiling and thresholds |

pub mod cascade;
pub mod config;
pub mod docx;
pub mod pdf;
pub mod registry;
pub mod scan;
pub mod text;
pub mod validate;

use scribe_core::{ExtractionRequest, ExtractionResult};
use std::sync::OnceLock;

pub use cascade::{AsciiRunStage, Cascade, CascadeOutcome, FnStage};
pub use config::{ExtractConfig, ParseMode};
pub use docx::DocxExtractor;
pub use pdf::PdfExtractor;
pub use registry::ExtractorRegistry;
pub use text::TextExtractor;
pub use validate::{is_readable, readability_ratio, ReadabilityCheck};

static REGISTRY: OnceLock<ExtractorRegistry> = OnceLock::new();

/// The process-wide registry, built from [`config::get`] on first use.
pub fn registry() -> &'static ExtractorRegistry {
    REGISTRY.get_or_init(|| ExtractorRegistry::with_config(config::get()))
}

/// Extract text from an upload without the readability gate.
#[must_use]
pub fn extract(request: &ExtractionRequest) -> ExtractionResult {
    registry().extract(request)
}

/// Extract text from an upload and reject unreadable results.
#[must_use]
pub fn extract_validated(request: &ExtractionRequest) -> ExtractionResult {
    registry().extract_validated(request)
}
