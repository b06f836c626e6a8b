//! Plain-text transcript extractor.

use encoding_rs::Encoding;
use scribe_core::{DocumentFormat, ExtractError, FormatExtractor, RecoveredText};
use std::borrow::Cow;
use tracing::debug;

/// Extractor for plain-text transcripts (`.txt`, `.md`, subtitle files).
///
/// Decoding never fails: invalid UTF-8 becomes U+FFFD. Whether the result is
/// meaningful is left to the readability check.
pub struct TextExtractor;

impl TextExtractor {
    /// Create a new text extractor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatExtractor for TextExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::PlainText
    }

    fn supported_types(&self) -> &[&str] {
        &[
            "text/plain",
            "text/markdown",
            "text/x-markdown",
            "text/vtt",
            "application/x-subrip",
        ]
    }

    fn extract_bytes(&self, data: &[u8]) -> Result<RecoveredText, ExtractError> {
        let (content, encoding) = decode(data);
        let trimmed = content.trim();

        if trimmed.is_empty() {
            return Err(ExtractError::NoExtractableText(
                "The transcript file is empty. Check that the right file was selected and that \
                 it was saved before uploading."
                    .to_string(),
            ));
        }

        debug!(encoding, chars = trimmed.len(), "Decoded plain-text transcript");
        Ok(RecoveredText::new(trimmed, encoding))
    }
}

/// Decode bytes, honouring a UTF-8 or UTF-16 BOM and falling back to lossy UTF-8.
fn decode(data: &[u8]) -> (Cow<'_, str>, &'static str) {
    if let Some((encoding, bom_len)) = Encoding::for_bom(data) {
        let (content, _) = encoding.decode_without_bom_handling(&data[bom_len..]);
        return (content, encoding.name());
    }
    (String::from_utf8_lossy(data), "UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_core::FailureKind;

    #[test]
    fn test_new_extractor() {
        let extractor = TextExtractor::new();
        assert!(!extractor.supported_types().is_empty());
        assert_eq!(extractor.format(), DocumentFormat::PlainText);
    }

    #[test]
    fn test_supported_types_includes_common_types() {
        let types = TextExtractor.supported_types();
        assert!(types.contains(&"text/plain"));
        assert!(types.contains(&"text/markdown"));
    }

    #[test]
    fn test_can_extract_by_extension() {
        let extractor = TextExtractor::new();
        assert!(extractor.can_extract_by_extension("txt"));
        assert!(extractor.can_extract_by_extension("md"));
        assert!(extractor.can_extract_by_extension("vtt"));
        assert!(!extractor.can_extract_by_extension("pdf"));
        assert!(!extractor.can_extract_by_extension("exe"));
    }

    #[test]
    fn test_can_extract_by_mime_or_extension() {
        let extractor = TextExtractor::new();
        assert!(extractor.can_extract("text/plain", None));
        assert!(extractor.can_extract("application/octet-stream", Some("txt")));
        assert!(!extractor.can_extract("application/octet-stream", Some("bin")));
    }

    #[test]
    fn test_extract_trims() {
        let recovered = TextExtractor
            .extract_bytes(b"\n\n  Speaker 1: Hello, world!  \n")
            .unwrap();
        assert_eq!(recovered.text, "Speaker 1: Hello, world!");
        assert_eq!(recovered.method, "UTF-8");
        assert_eq!(recovered.page_count, None);
    }

    #[test]
    fn test_extract_keeps_inner_layout() {
        let text = "Line 1\nLine 2\n\nLine 3";
        let recovered = TextExtractor.extract_bytes(text.as_bytes()).unwrap();
        assert_eq!(recovered.text, text);
    }

    #[test]
    fn test_extract_handles_unicode() {
        let text = "Réunion: 世界 🌍 Привет";
        let recovered = TextExtractor.extract_bytes(text.as_bytes()).unwrap();
        assert_eq!(recovered.text, text);
    }

    #[test]
    fn test_extract_invalid_utf8_is_lossy() {
        let recovered = TextExtractor.extract_bytes(b"ok \xff\xfe\xfd done").unwrap();
        assert!(recovered.text.starts_with("ok "));
        assert!(recovered.text.contains('\u{FFFD}'));
    }

    #[test]
    fn test_extract_strips_utf8_bom() {
        let recovered = TextExtractor
            .extract_bytes(b"\xEF\xBB\xBFAgenda")
            .unwrap();
        assert_eq!(recovered.text, "Agenda");
    }

    #[test]
    fn test_extract_utf16le_with_bom() {
        let mut data = vec![0xFF, 0xFE];
        for unit in "Minutes".encode_utf16() {
            data.extend_from_slice(&unit.to_le_bytes());
        }
        let recovered = TextExtractor.extract_bytes(&data).unwrap();
        assert_eq!(recovered.text, "Minutes");
        assert_eq!(recovered.method, "UTF-16LE");
    }

    #[test]
    fn test_extract_empty_file_fails() {
        let err = TextExtractor.extract_bytes(b"").unwrap_err();
        assert_eq!(err.kind(), FailureKind::NoExtractableText);
    }

    #[test]
    fn test_extract_whitespace_only_fails() {
        let err = TextExtractor.extract_bytes(b" \n\t \r\n").unwrap_err();
        assert_eq!(err.kind(), FailureKind::NoExtractableText);
    }
}
