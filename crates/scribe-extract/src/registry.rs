//! Extractor registry: dispatch, size ceiling and the validation gate.

use scribe_core::{
    DocumentFormat, ExtractError, ExtractionRequest, ExtractionResult, FailureKind,
    FormatExtractor,
};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cascade::readability_error;
use crate::config::ExtractConfig;
use crate::validate::{readability_ratio, ReadabilityCheck};
use crate::{DocxExtractor, PdfExtractor, TextExtractor};

/// MIME types that say nothing about the content.
const GENERIC_MIME_TYPES: &[&str] = &[
    "application/octet-stream",
    "binary/octet-stream",
    "application/x-download",
    "application/force-download",
    "application/unknown",
];

/// Registry of format extractors.
pub struct ExtractorRegistry {
    /// Named extractors
    extractors: HashMap<String, Arc<dyn FormatExtractor>>,
    /// MIME type to extractor name mapping
    mime_mapping: HashMap<String, String>,
    /// Gate applied by [`extract_validated`](Self::extract_validated)
    readability: ReadabilityCheck,
    /// Largest accepted input, in bytes
    max_input_bytes: Option<usize>,
}

impl ExtractorRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            extractors: HashMap::new(),
            mime_mapping: HashMap::new(),
            readability: ReadabilityCheck::default(),
            max_input_bytes: None,
        }
    }

    /// Create a registry with the text, PDF and DOCX extractors.
    #[must_use]
    pub fn with_config(config: &ExtractConfig) -> Self {
        let mut registry = Self::new();
        registry.readability = config.readability();
        registry.max_input_bytes = config.max_input_bytes;
        registry.register("text", TextExtractor::new());
        registry.register("pdf", PdfExtractor::with_config(config));
        registry.register("docx", DocxExtractor::with_config(config));
        registry
    }

    /// Register an extractor, replacing any previous one with the same name.
    pub fn register<E: FormatExtractor + 'static>(&mut self, name: &str, extractor: E) {
        let extractor = Arc::new(extractor);
        for mime in extractor.supported_types() {
            self.mime_mapping
                .insert((*mime).to_string(), name.to_string());
        }
        self.extractors.insert(name.to_string(), extractor);
    }

    /// Get an extractor for a MIME type.
    #[must_use]
    pub fn get_for_mime(&self, mime_type: &str) -> Option<Arc<dyn FormatExtractor>> {
        self.mime_mapping
            .get(mime_type)
            .and_then(|name| self.extractors.get(name))
            .cloned()
    }

    /// Get the extractor for a request.
    ///
    /// A specific MIME type decides on its own; the filename extension is only
    /// consulted when the MIME type is absent or generic.
    pub fn get_for_request(
        &self,
        request: &ExtractionRequest,
    ) -> Result<Arc<dyn FormatExtractor>, ExtractError> {
        let mime = request.mime_type().map(normalize_mime);
        let extension = request.extension();

        match mime.as_deref() {
            Some(mime) if !is_generic_mime(mime) => {
                return self
                    .get_for_mime(mime)
                    .ok_or_else(|| ExtractError::UnsupportedFormat(mime.to_string()));
            }
            _ => {}
        }

        if let Some(ext) = extension.as_deref() {
            // Sorted so overlapping registrations resolve the same way every time
            let mut names: Vec<&String> = self.extractors.keys().collect();
            names.sort();
            for name in names {
                let extractor = &self.extractors[name];
                if extractor.can_extract_by_extension(ext) {
                    return Ok(extractor.clone());
                }
            }
        }

        let declared = extension
            .map(|ext| format!(".{ext}"))
            .or(mime)
            .unwrap_or_else(|| "unknown".to_string());
        Err(ExtractError::UnsupportedFormat(declared))
    }

    /// Extract text from an upload.
    ///
    /// Never panics and never returns an error: every failure is a result
    /// with `succeeded == false`. Plain text is not run through the
    /// readability check here; use [`extract_validated`](Self::extract_validated)
    /// for the full pipeline.
    #[must_use]
    pub fn extract(&self, request: &ExtractionRequest) -> ExtractionResult {
        let extractor = match self.get_for_request(request) {
            Ok(extractor) => extractor,
            Err(err) => {
                info!(
                    mime = request.mime_type().unwrap_or(""),
                    file = request.file_name().unwrap_or(""),
                    "Rejected unsupported upload"
                );
                return ExtractionResult::failure(None, err.kind(), err.to_string());
            }
        };
        let format = extractor.format();

        if let Some(max) = self.max_input_bytes {
            if request.data().len() > max {
                warn!(bytes = request.data().len(), max, "Upload exceeds size ceiling");
                return ExtractionResult::failure(
                    Some(format),
                    FailureKind::DecodeError,
                    format!(
                        "This {format} file is too large to process ({} bytes; the limit is {max} \
                         bytes). Split the transcript into smaller files.",
                        request.data().len()
                    ),
                );
            }
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            extractor.extract_bytes(request.data())
        }))
        .unwrap_or_else(|_| {
            Err(ExtractError::Failed(format!(
                "the {format} reader crashed on this file; it is probably corrupted"
            )))
        });

        match outcome {
            Ok(recovered) => {
                debug!(
                    %format,
                    method = %recovered.method,
                    chars = recovered.text.len(),
                    pages = ?recovered.page_count,
                    "Extraction succeeded"
                );
                ExtractionResult::success(format, recovered)
            }
            Err(err) => {
                info!(%format, kind = %err.kind(), "Extraction failed: {}", err);
                ExtractionResult::failure(Some(format), err.kind(), err.to_string())
            }
        }
    }

    /// Extract, then reject successful text that fails the readability check.
    #[must_use]
    pub fn extract_validated(&self, request: &ExtractionRequest) -> ExtractionResult {
        let result = self.extract(request);
        if !result.succeeded || self.readability.is_readable(&result.text) {
            return result;
        }

        let ratio = readability_ratio(&result.text);
        let format = result.format.unwrap_or(DocumentFormat::PlainText);
        debug!(%format, ratio, "Extracted text failed readability check");
        let err = readability_error(format, ratio);
        ExtractionResult::failure(result.format, err.kind(), err.to_string())
    }

    /// [`extract_validated`](Self::extract_validated) on a blocking worker.
    pub async fn extract_async(self: &Arc<Self>, request: ExtractionRequest) -> ExtractionResult {
        let registry = Arc::clone(self);
        tokio::task::spawn_blocking(move || registry.extract_validated(&request))
            .await
            .unwrap_or_else(|e| {
                ExtractionResult::failure(
                    None,
                    FailureKind::DecodeError,
                    format!("Extraction task failed: {e}"),
                )
            })
    }

    /// Read a file and run [`extract_async`](Self::extract_async) on it.
    pub async fn extract_file(
        self: &Arc<Self>,
        path: &Path,
        mime_type: Option<&str>,
    ) -> ExtractionResult {
        debug!("Reading {:?}", path);
        let data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(e) => {
                return ExtractionResult::failure(
                    None,
                    FailureKind::DecodeError,
                    format!("Could not read {}: {e}", path.display()),
                )
            }
        };

        let mut request = ExtractionRequest::new(data);
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            request = request.with_file_name(name);
        }
        if let Some(mime) = mime_type {
            request = request.with_mime_type(mime);
        }

        self.extract_async(request).await
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercase and drop parameters such as `; charset=utf-8`.
fn normalize_mime(mime: &str) -> String {
    mime.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn is_generic_mime(mime: &str) -> bool {
    mime.is_empty() || GENERIC_MIME_TYPES.contains(&mime)
}
