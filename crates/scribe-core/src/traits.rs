//! Core traits for scribe components.
//!
//! - [`FormatExtractor`]: turn the bytes of one format into text
//! - [`RecoveryStage`]: one step of a heuristic fallback cascade
//!
//! Both are object-safe so registries and cascades can hold them as
//! `Arc<dyn _>` / `Box<dyn _>` and swap a structural parser for a heuristic
//! one without changing the extraction contract.

use crate::error::ExtractError;
use crate::types::{DocumentFormat, RecoveredText};

// ============================================================================
// Format Extraction
// ============================================================================

/// Trait for extracting text from one document format.
///
/// Implementations are CPU-bound and synchronous; async callers offload them
/// to a blocking worker.
pub trait FormatExtractor: Send + Sync {
    /// The format this extractor handles.
    fn format(&self) -> DocumentFormat;

    /// Returns the MIME types this extractor can handle.
    fn supported_types(&self) -> &[&str];

    /// Check if this extractor can handle the given MIME type or extension.
    fn can_extract(&self, mime_type: &str, extension: Option<&str>) -> bool {
        self.supported_types().contains(&mime_type)
            || extension.is_some_and(|ext| self.can_extract_by_extension(ext))
    }

    /// Check if extractor can handle based on a lowercase file extension.
    fn can_extract_by_extension(&self, extension: &str) -> bool {
        self.format().extensions().contains(&extension)
    }

    /// Extract text from raw bytes.
    fn extract_bytes(&self, data: &[u8]) -> Result<RecoveredText, ExtractError>;
}

// ============================================================================
// Heuristic Recovery
// ============================================================================

/// One heuristic text-recovery step over a byte corpus.
///
/// Returning `None` (or an empty string) means "nothing found here", and the
/// cascade moves on to the next, less targeted stage.
pub trait RecoveryStage: Send + Sync {
    /// Stable stage name, reported as the extraction method.
    fn name(&self) -> &str;

    /// Attempt to recover cleaned text from `corpus`.
    fn recover(&self, corpus: &[u8]) -> Option<String>;
}
