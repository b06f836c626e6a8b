//! Core types for scribe.
//!
//! ## Input
//! - [`ExtractionRequest`]: immutable upload bytes plus a format hint
//!
//! ## Output
//! - [`ExtractionResult`]: text, verdict, failure reason and page count
//! - [`ExtractionFailure`] / [`FailureKind`]: the closed failure taxonomy
//!
//! ## Formats
//! - [`DocumentFormat`]: the recognized upload formats
//! - [`RecoveredText`]: what a single extractor hands back before validation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

// ============================================================================
// Formats
// ============================================================================

/// MIME type of DOCX documents.
pub const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Upload formats the extractor recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// UTF-8 (or BOM-marked UTF-16) text
    PlainText,
    /// Portable Document Format
    Pdf,
    /// Office Open XML word-processing document
    Docx,
}

impl DocumentFormat {
    /// Canonical MIME type.
    #[must_use]
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::PlainText => "text/plain",
            Self::Pdf => "application/pdf",
            Self::Docx => DOCX_MIME,
        }
    }

    /// Filename extensions (lowercase, without the dot).
    #[must_use]
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::PlainText => &["txt", "text", "md", "vtt", "srt"],
            Self::Pdf => &["pdf"],
            Self::Docx => &["docx"],
        }
    }

    /// Whether results for this format carry a page count.
    #[must_use]
    pub fn is_paginated(self) -> bool {
        matches!(self, Self::Pdf)
    }

    /// Short human name used in messages.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::PlainText => "text",
            Self::Pdf => "PDF",
            Self::Docx => "DOCX",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Request
// ============================================================================

/// An uploaded file awaiting extraction.
///
/// The payload is shared, so cloning a request is cheap and never copies bytes.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    data: Arc<[u8]>,
    mime_type: Option<String>,
    file_name: Option<String>,
}

impl ExtractionRequest {
    /// Create a request with no format hint.
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            data: data.into(),
            mime_type: None,
            file_name: None,
        }
    }

    /// Attach the declared MIME type.
    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Attach the original filename.
    #[must_use]
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Raw bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Declared MIME type, if any.
    #[must_use]
    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    /// Original filename, if any.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Lowercased filename extension.
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        self.file_name
            .as_deref()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
    }
}

// ============================================================================
// Output
// ============================================================================

/// Closed set of reasons an extraction can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// Declared type/extension is not plain text, PDF or DOCX
    UnsupportedFormat,
    /// Bytes could not be interpreted as the expected container at all
    DecodeError,
    /// Every strategy came back empty
    NoExtractableText,
    /// Text was recovered but is mostly non-readable characters
    ReadabilityRejected,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::UnsupportedFormat => "UnsupportedFormat",
            Self::DecodeError => "DecodeError",
            Self::NoExtractableText => "NoExtractableText",
            Self::ReadabilityRejected => "ReadabilityRejected",
        };
        f.write_str(name)
    }
}

/// Why an extraction failed, in words meant for the end user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionFailure {
    pub kind: FailureKind,
    pub message: String,
}

/// Text recovered by one extractor, before the registry wraps it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredText {
    /// Cleaned text
    pub text: String,
    /// Page count for paginated formats
    pub page_count: Option<u32>,
    /// Name of the strategy that produced the text
    pub method: String,
}

impl RecoveredText {
    /// Create recovered text without a page count.
    pub fn new(text: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            page_count: None,
            method: method.into(),
        }
    }

    /// Attach a page count.
    #[must_use]
    pub fn with_page_count(mut self, page_count: Option<u32>) -> Self {
        self.page_count = page_count;
        self
    }
}

/// Outcome of a single extraction.
///
/// `succeeded` is true exactly when `failure` is `None`, and a failed result
/// always carries empty `text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub text: String,
    pub succeeded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<ExtractionFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<DocumentFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

impl ExtractionResult {
    /// Successful result for `format`.
    #[must_use]
    pub fn success(format: DocumentFormat, recovered: RecoveredText) -> Self {
        Self {
            text: recovered.text,
            succeeded: true,
            failure: None,
            page_count: recovered.page_count,
            format: Some(format),
            method: Some(recovered.method),
        }
    }

    /// Failed result. The text is always empty.
    pub fn failure(
        format: Option<DocumentFormat>,
        kind: FailureKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            text: String::new(),
            succeeded: false,
            failure: Some(ExtractionFailure {
                kind,
                message: message.into(),
            }),
            page_count: None,
            format,
            method: None,
        }
    }

    /// Failure kind, if the extraction failed.
    #[must_use]
    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.failure.as_ref().map(|f| f.kind)
    }

    /// User-facing failure message, if the extraction failed.
    #[must_use]
    pub fn failure_message(&self) -> Option<&str> {
        self.failure.as_ref().map(|f| f.message.as_str())
    }
}
