//! PDF text extractor.
//!
//! Structural mode parses the document with lopdf and extracts text page by
//! page. When lopdf cannot load the file, or finds no readable text, the
//! heuristic cascade scrapes literal strings out of the raw bytes (plus any
//! inflatable `FlateDecode` streams), most targeted pattern first.

use lopdf::Document;
use once_cell::sync::Lazy;
use regex::bytes::Regex;
use scribe_core::{DocumentFormat, ExtractError, FormatExtractor, RecoveredText};
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, warn};

use crate::cascade::{readability_error, AsciiRunStage, Cascade, CascadeOutcome, FnStage};
use crate::config::{ExtractConfig, ParseMode};
use crate::scan::{
    decode_pdf_string, inflate_zlib, join_fragments, pdf_literals, read_pdf_literal,
    MAX_INFLATED_TOTAL,
};
use crate::validate::ReadabilityCheck;

/// How far into the file the `%PDF-` signature may appear.
const SIGNATURE_WINDOW: usize = 1024;

/// Longest text object or literal followed before its end marker is given up on.
const MAX_REGION_LEN: usize = 64 * 1024;

static STREAM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s-u)stream\r?\n(.*?)endstream").expect("valid regex"));
static KEYWORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?-u)/(?:Title|Author|Subject|Keywords|Contents|V)\s*\(").expect("valid regex")
});
static PAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?-u)/Type\s*/Page\b").expect("valid regex"));

/// Extractor for PDF files.
pub struct PdfExtractor {
    mode: ParseMode,
    readability: ReadabilityCheck,
    cascade: Cascade,
}

impl PdfExtractor {
    /// Create a PDF extractor with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&ExtractConfig::default())
    }

    /// Create a PDF extractor from explicit settings.
    #[must_use]
    pub fn with_config(config: &ExtractConfig) -> Self {
        Self {
            mode: config.mode,
            readability: config.readability(),
            cascade: heuristic_cascade(config),
        }
    }

    /// Stage names of the heuristic cascade, in run order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.cascade.stage_names()
    }

    /// Run the heuristic cascade over raw PDF bytes.
    fn extract_heuristic(
        &self,
        data: &[u8],
        structural_rejection: Option<f64>,
    ) -> Result<RecoveredText, ExtractError> {
        let corpus = build_corpus(data);
        let page_count = count_pages(&corpus);

        match self.cascade.run(&corpus, &self.readability) {
            CascadeOutcome::Accepted { stage, text } => {
                debug!(stage = %stage, chars = text.len(), ?page_count, "Heuristic PDF extraction succeeded");
                Ok(RecoveredText::new(text, stage).with_page_count(page_count))
            }
            CascadeOutcome::Rejected { ratio, .. } => {
                let ratio = structural_rejection.map_or(ratio, |s| s.max(ratio));
                Err(readability_error(DocumentFormat::Pdf, ratio))
            }
            CascadeOutcome::Exhausted => match structural_rejection {
                Some(ratio) => Err(readability_error(DocumentFormat::Pdf, ratio)),
                None => Err(no_text_error()),
            },
        }
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatExtractor for PdfExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pdf
    }

    fn supported_types(&self) -> &[&str] {
        &["application/pdf", "application/x-pdf"]
    }

    fn extract_bytes(&self, data: &[u8]) -> Result<RecoveredText, ExtractError> {
        if !has_pdf_signature(data) {
            return Err(ExtractError::Decode(
                "This file is not a valid PDF (the PDF header is missing). It may be corrupted \
                 or saved in a different format; try re-exporting it as PDF."
                    .to_string(),
            ));
        }

        if self.mode == ParseMode::Heuristic {
            return self.extract_heuristic(data, None);
        }

        let mut structural_rejection = None;
        match panic::catch_unwind(AssertUnwindSafe(|| parse_structural(data))) {
            Ok(Ok(parsed)) => {
                let text = normalize_layout(&parsed.text);
                if self.readability.is_readable(&text) {
                    debug!(pages = parsed.page_count, chars = text.len(), "lopdf extraction succeeded");
                    return Ok(RecoveredText::new(text, "lopdf").with_page_count(Some(parsed.page_count)));
                }
                if !text.is_empty() {
                    structural_rejection = Some(crate::validate::readability_ratio(&text));
                }
                debug!(pages = parsed.page_count, "lopdf found no readable text, trying heuristics");
            }
            Ok(Err(e)) => debug!("lopdf could not parse PDF, trying heuristics: {}", e),
            Err(_) => warn!("lopdf panicked while parsing PDF, trying heuristics"),
        }

        self.extract_heuristic(data, structural_rejection)
    }
}

// ============================================================================
// Structural parsing
// ============================================================================

struct ParsedPdf {
    text: String,
    page_count: u32,
}

/// Parse with lopdf and extract text from every page.
fn parse_structural(data: &[u8]) -> Result<ParsedPdf, String> {
    let mut doc = Document::load_mem(data).map_err(|e| format!("failed to load PDF: {e}"))?;

    if doc.is_encrypted() {
        doc.decrypt("")
            .map_err(|e| format!("cannot decrypt password-protected PDF: {e}"))?;
    }
    doc.decompress();

    let mut pages: Vec<u32> = doc.get_pages().keys().copied().collect();
    pages.sort_unstable();

    #[allow(clippy::cast_possible_truncation)]
    let page_count = pages.len() as u32;
    if pages.is_empty() {
        return Ok(ParsedPdf {
            text: String::new(),
            page_count,
        });
    }

    let text = doc
        .extract_text(&pages)
        .map_err(|e| format!("failed to extract text: {e}"))?;

    Ok(ParsedPdf { text, page_count })
}

/// Trim lines, collapse spaces within them and drop repeated blank lines.
fn normalize_layout(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;

    for line in text.lines() {
        let line = crate::scan::clean_fragment(line);
        if line.is_empty() {
            blank_run += 1;
            continue;
        }
        if !out.is_empty() {
            out.push_str(if blank_run > 0 { "\n\n" } else { "\n" });
        }
        out.push_str(&line);
        blank_run = 0;
    }

    out
}

// ============================================================================
// Heuristic cascade
// ============================================================================

fn heuristic_cascade(config: &ExtractConfig) -> Cascade {
    Cascade::new()
        .with_stage(FnStage::new("text-objects", text_objects))
        .with_stage(FnStage::new("stream-literals", stream_literals))
        .with_stage(FnStage::new("dictionary-literals", dictionary_literals))
        .with_stage(FnStage::new("keyword-literals", keyword_literals))
        .with_stage(AsciiRunStage {
            min_run_len: config.min_run_len,
            min_total_len: config.min_text_len,
        })
}

/// Whether `%PDF-` appears near the start of the data.
fn has_pdf_signature(data: &[u8]) -> bool {
    let window = &data[..data.len().min(SIGNATURE_WINDOW)];
    window.windows(5).any(|w| w == b"%PDF-")
}

/// Raw bytes followed by every stream body that inflates as zlib.
fn build_corpus(data: &[u8]) -> Vec<u8> {
    let mut corpus = data.to_vec();
    let mut inflated_total = 0usize;

    for caps in STREAM_RE.captures_iter(data) {
        if inflated_total >= MAX_INFLATED_TOTAL {
            debug!("Inflated stream budget reached");
            break;
        }
        let Some(body) = caps.get(1) else { continue };
        if let Some(inflated) = inflate_zlib(body.as_bytes()) {
            inflated_total += inflated.len();
            corpus.push(b'\n');
            corpus.extend_from_slice(&inflated);
        }
    }

    corpus
}

/// Number of `/Type /Page` dictionaries, if any.
fn count_pages(corpus: &[u8]) -> Option<u32> {
    let count = PAGE_RE.find_iter(corpus).count();
    #[allow(clippy::cast_possible_truncation)]
    (count > 0).then_some(count as u32)
}

/// PDF whitespace and delimiter bytes, which end a keyword token.
fn is_delimiter(b: u8) -> bool {
    b == 0 || b.is_ascii_whitespace() || b"()<>[]{}/%".contains(&b)
}

/// Whether `keyword` stands alone as a token at `pos`.
fn is_keyword_at(corpus: &[u8], pos: usize, keyword: &[u8]) -> bool {
    corpus[pos..].starts_with(keyword)
        && (pos == 0 || is_delimiter(corpus[pos - 1]))
        && corpus.get(pos + keyword.len()).map_or(true, |&b| is_delimiter(b))
}

/// Read the literal opening at `pos`, looking no further than [`MAX_REGION_LEN`].
fn literal_at(corpus: &[u8], pos: usize) -> Option<(String, usize)> {
    let window = &corpus[..corpus.len().min(pos + MAX_REGION_LEN)];
    read_pdf_literal(window, pos).map(|(raw, end)| (decode_pdf_string(&raw), end))
}

/// Literals of every closed `BT … ET` text object.
///
/// Literal strings are skipped as whole tokens, so an `ET` inside one does
/// not end the object. Objects with no `ET` within reach are dropped.
fn text_object_literals(corpus: &[u8]) -> Vec<String> {
    let mut literals = Vec::new();
    let mut pending = Vec::new();
    let mut open: Option<usize> = None;
    let mut i = 0;

    while i < corpus.len() {
        match (corpus[i], open) {
            (b'(', Some(_)) => {
                if let Some((literal, end)) = literal_at(corpus, i) {
                    pending.push(literal);
                    i = end;
                    continue;
                }
                pending.clear();
                open = None;
            }
            (b'B', None) if is_keyword_at(corpus, i, b"BT") => {
                open = Some(i);
                i += 2;
                continue;
            }
            (b'E', Some(_)) if is_keyword_at(corpus, i, b"ET") => {
                literals.append(&mut pending);
                open = None;
                i += 2;
                continue;
            }
            (_, Some(start)) if i - start > MAX_REGION_LEN => {
                pending.clear();
                open = None;
            }
            _ => {}
        }
        i += 1;
    }

    literals
}

/// Literals of every closed `<< … >>` dictionary, nested ones included.
///
/// Depth resets at `stream` and `endobj`, which never occur inside a
/// dictionary, so a stray `<<` in binary data cannot swallow the file.
fn dictionary_literal_values(corpus: &[u8]) -> Vec<String> {
    let mut literals = Vec::new();
    let mut pending = Vec::new();
    let mut depth = 0usize;
    let mut i = 0;

    while i < corpus.len() {
        match corpus[i] {
            b'<' if corpus.get(i + 1) == Some(&b'<') => {
                depth += 1;
                i += 2;
                continue;
            }
            b'>' if depth > 0 && corpus.get(i + 1) == Some(&b'>') => {
                depth -= 1;
                if depth == 0 {
                    literals.append(&mut pending);
                }
                i += 2;
                continue;
            }
            b'(' if depth > 0 => {
                if let Some((literal, end)) = literal_at(corpus, i) {
                    pending.push(literal);
                    i = end;
                    continue;
                }
                pending.clear();
                depth = 0;
            }
            b's' | b'e'
                if depth > 0
                    && (is_keyword_at(corpus, i, b"stream")
                        || is_keyword_at(corpus, i, b"endobj")) =>
            {
                pending.clear();
                depth = 0;
            }
            _ => {}
        }
        i += 1;
    }

    literals
}

/// Stage 1: literals inside `BT … ET` text objects.
fn text_objects(corpus: &[u8]) -> Option<String> {
    join_fragments(text_object_literals(corpus))
}

/// Stage 2: literals inside `stream … endstream` payloads.
fn stream_literals(corpus: &[u8]) -> Option<String> {
    join_fragments(
        STREAM_RE
            .captures_iter(corpus)
            .filter_map(|caps| caps.get(1))
            .flat_map(|body| pdf_literals(body.as_bytes())),
    )
}

/// Stage 3: literals inside `<< … >>` dictionaries.
fn dictionary_literals(corpus: &[u8]) -> Option<String> {
    join_fragments(dictionary_literal_values(corpus))
}

/// Stage 4: literals following known metadata and annotation keys.
fn keyword_literals(corpus: &[u8]) -> Option<String> {
    join_fragments(KEYWORD_RE.find_iter(corpus).filter_map(|m| {
        read_pdf_literal(corpus, m.end() - 1).map(|(raw, _)| decode_pdf_string(&raw))
    }))
}

fn no_text_error() -> ExtractError {
    ExtractError::NoExtractableText(
        "No readable text could be extracted from this PDF. Likely causes: the PDF is \
         image-based (scanned pages without a text layer; try running it through OCR first), \
         it is encrypted or password-protected, or the file is corrupted or uses an unusual \
         text encoding. If you have the transcript as text, upload it as a .txt file instead."
            .to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_core::FailureKind;

    fn heuristic() -> PdfExtractor {
        PdfExtractor::with_config(&ExtractConfig::default().with_mode(ParseMode::Heuristic))
    }

    #[test]
    fn test_supported_types() {
        let extractor = PdfExtractor::new();
        assert!(extractor.supported_types().contains(&"application/pdf"));
        assert_eq!(extractor.format(), DocumentFormat::Pdf);
    }

    #[test]
    fn test_can_extract_by_extension() {
        let extractor = PdfExtractor::new();
        assert!(extractor.can_extract_by_extension("pdf"));
        assert!(!extractor.can_extract_by_extension("docx"));
    }

    #[test]
    fn test_stage_order() {
        assert_eq!(
            PdfExtractor::new().stage_names(),
            vec![
                "text-objects",
                "stream-literals",
                "dictionary-literals",
                "keyword-literals",
                "ascii-runs"
            ]
        );
    }

    #[test]
    fn test_signature_detection() {
        assert!(has_pdf_signature(b"%PDF-1.7\n"));
        assert!(has_pdf_signature(b"\r\n\r\n%PDF-1.4"));
        assert!(!has_pdf_signature(b"PK\x03\x04"));
        assert!(!has_pdf_signature(b""));
    }

    #[test]
    fn test_missing_signature_is_decode_error() {
        let err = PdfExtractor::new()
            .extract_bytes(b"just some text pretending to be a pdf")
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::DecodeError);
    }

    #[test]
    fn test_text_objects_stage() {
        let corpus = b"stuff BT /F1 12 Tf (Weekly) Tj (sync) Tj ET more BT (notes) Tj ET";
        assert_eq!(text_objects(corpus).as_deref(), Some("Weekly sync notes"));
    }

    #[test]
    fn test_text_objects_ignore_literals_outside() {
        assert_eq!(text_objects(b"<< /Title (Outside) >>"), None);
    }

    #[test]
    fn test_text_objects_skip_end_marker_inside_literal() {
        let corpus = b"BT (Hello team, welcome back) Tj ET BT (Standup moves to 9 ET every day) Tj ET";
        assert_eq!(
            text_objects(corpus).as_deref(),
            Some("Hello team, welcome back Standup moves to 9 ET every day")
        );
    }

    #[test]
    fn test_text_objects_need_standalone_markers() {
        // "BTW" and "GET" are not operators; the object below is never closed
        assert_eq!(text_objects(b"BTW (not text) GET"), None);
        assert_eq!(text_objects(b"BT (Dangling object) Tj"), None);
        assert_eq!(
            text_objects(b"BT\n(Tight)Tj\nET").as_deref(),
            Some("Tight")
        );
    }

    #[test]
    fn test_stream_literals_stage() {
        let corpus = b"obj << /Length 20 >>\nstream\n(Quarterly planning) \nendstream";
        assert_eq!(
            stream_literals(corpus).as_deref(),
            Some("Quarterly planning")
        );
    }

    #[test]
    fn test_dictionary_literals_stage() {
        let corpus = b"<< /Producer (Acme Minutes Writer) >>";
        assert_eq!(
            dictionary_literals(corpus).as_deref(),
            Some("Acme Minutes Writer")
        );
    }

    #[test]
    fn test_dictionary_literals_follow_nesting() {
        let corpus =
            b"<< /Info << /Type /Catalog >> /Producer (Acme Minutes Writer) >> (outside)";
        assert_eq!(
            dictionary_literals(corpus).as_deref(),
            Some("Acme Minutes Writer")
        );
    }

    #[test]
    fn test_dictionary_depth_resets_at_stream() {
        let corpus = b"<< /Length 12 stream\n(binary junk)\nendstream << /Title (Kept) >>";
        assert_eq!(dictionary_literals(corpus).as_deref(), Some("Kept"));
    }

    #[test]
    fn test_keyword_literals_stage() {
        let corpus = b"/Title (Board meeting) /Author(Dana) /Producer (ignored)";
        assert_eq!(
            keyword_literals(corpus).as_deref(),
            Some("Board meeting Dana")
        );
    }

    #[test]
    fn test_count_pages_excludes_pages_tree() {
        let corpus = b"<< /Type /Pages /Count 2 >> << /Type /Page >> << /Type/Page >>";
        assert_eq!(count_pages(corpus), Some(2));
        assert_eq!(count_pages(b"no pages here"), None);
    }

    #[test]
    fn test_corpus_includes_inflated_streams() {
        use flate2::write::ZlibEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"BT (Compressed hello) Tj ET").unwrap();
        let compressed = encoder.finish().unwrap();

        let mut data = b"%PDF-1.4\n1 0 obj << /Filter /FlateDecode >>\nstream\n".to_vec();
        data.extend_from_slice(&compressed);
        data.extend_from_slice(b"\nendstream\nendobj\n");

        let corpus = build_corpus(&data);
        assert_eq!(text_objects(&corpus).as_deref(), Some("Compressed hello"));
    }

    #[test]
    fn test_heuristic_extracts_minimal_pdf() {
        let data = b"%PDF-1.4\n1 0 obj << /Type /Page >> endobj\n\
            2 0 obj << /Length 44 >>\nstream\nBT /F1 12 Tf (Minutes of the weekly sync) Tj ET\nendstream\nendobj\n%%EOF";
        let recovered = heuristic().extract_bytes(data).unwrap();

        assert_eq!(recovered.text, "Minutes of the weekly sync");
        assert_eq!(recovered.method, "text-objects");
        assert_eq!(recovered.page_count, Some(1));
    }

    #[test]
    fn test_heuristic_no_text_is_no_extractable_text() {
        let mut data = b"%PDF-1.4\n1 0 obj << /Type /XObject /Subtype /Image >>\nstream\n".to_vec();
        data.extend((0..200u32).map(|i| 0x80 | (i % 0x7F) as u8));
        data.extend_from_slice(b"\nendstream\nendobj\n%%EOF");

        let err = heuristic().extract_bytes(&data).unwrap_err();
        assert_eq!(err.kind(), FailureKind::NoExtractableText);
        assert!(err.to_string().contains("image-based"));
    }

    #[test]
    fn test_heuristic_noise_is_readability_rejected() {
        let data = b"%PDF-1.4\nBT (#$%^&*@~<>[]{}|#$%^&*) Tj ET\n%%EOF";
        let err = heuristic().extract_bytes(data).unwrap_err();
        assert_eq!(err.kind(), FailureKind::ReadabilityRejected);
    }

    #[test]
    fn test_normalize_layout() {
        assert_eq!(
            normalize_layout("  Line   one \n\n\n\nLine two\n  \nLine three  \n"),
            "Line one\n\nLine two\n\nLine three"
        );
    }

    #[test]
    fn test_structural_garbage_falls_back_without_panicking() {
        let data = b"%PDF-1.7\n\x00\x01\x02 broken xref BT (Fallback text works) Tj ET";
        let recovered = PdfExtractor::new().extract_bytes(data).unwrap();
        assert_eq!(recovered.text, "Fallback text works");
        assert_eq!(recovered.method, "text-objects");
    }
}
