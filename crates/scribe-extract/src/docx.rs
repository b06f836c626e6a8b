//! DOCX text extractor.
//!
//! DOCX files are ZIP archives containing XML files. The main document
//! content is in `word/document.xml`, which structural mode streams with
//! quick-xml. If the archive will not open, the heuristic cascade inflates
//! whatever local entries it can find and scrapes text out of the XML.

use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use regex::bytes::Regex;
use scribe_core::{DocumentFormat, ExtractError, FormatExtractor, RecoveredText, DOCX_MIME};
use std::io::{BufReader, Cursor};
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, warn};

use crate::cascade::{readability_error, AsciiRunStage, Cascade, CascadeOutcome, FnStage};
use crate::config::{ExtractConfig, ParseMode};
use crate::scan::{clean_fragment, inflate_raw, join_fragments, xml_unescape, MAX_INFLATED_TOTAL};
use crate::validate::{readability_ratio, ReadabilityCheck};

/// ZIP local file header signature.
const LOCAL_HEADER: &[u8] = b"PK\x03\x04";

/// Fixed part of a ZIP local file header.
const LOCAL_HEADER_LEN: usize = 30;

static TEXT_RUN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s-u)<w:t(?:\s[^>]*)?>(.*?)</w:t>|</w:p>|<w:(?:tab|br|cr)\s*/>")
        .expect("valid regex")
});
static XML_TEXT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?-u)>([^<>]+)<").expect("valid regex"));
static PROPERTY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s-u)<(?:dc|cp):(?:title|subject|description|keywords)(?:\s[^>]*)?>([^<]*)<")
        .expect("valid regex")
});
static ATTRIBUTE_VALUE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?-u)\s(?:w:val|descr|title)="([^"]*)""#).expect("valid regex")
});

/// Extractor for DOCX files.
pub struct DocxExtractor {
    mode: ParseMode,
    readability: ReadabilityCheck,
    cascade: Cascade,
}

impl DocxExtractor {
    /// Create a DOCX extractor with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&ExtractConfig::default())
    }

    /// Create a DOCX extractor from explicit settings.
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

    fn extract_heuristic(
        &self,
        data: &[u8],
        structural_rejection: Option<f64>,
    ) -> Result<RecoveredText, ExtractError> {
        let corpus = build_corpus(data);

        match self.cascade.run(&corpus, &self.readability) {
            CascadeOutcome::Accepted { stage, text } => {
                debug!(stage = %stage, chars = text.len(), "Heuristic DOCX extraction succeeded");
                Ok(RecoveredText::new(text, stage))
            }
            CascadeOutcome::Rejected { ratio, .. } => {
                let ratio = structural_rejection.map_or(ratio, |s| s.max(ratio));
                Err(readability_error(DocumentFormat::Docx, ratio))
            }
            CascadeOutcome::Exhausted => match structural_rejection {
                Some(ratio) => Err(readability_error(DocumentFormat::Docx, ratio)),
                None => Err(no_text_error()),
            },
        }
    }
}

impl Default for DocxExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatExtractor for DocxExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Docx
    }

    fn supported_types(&self) -> &[&str] {
        &[DOCX_MIME]
    }

    fn extract_bytes(&self, data: &[u8]) -> Result<RecoveredText, ExtractError> {
        if !data.starts_with(LOCAL_HEADER) {
            return Err(ExtractError::Decode(
                "This file is not a valid DOCX document (it is not a ZIP archive). Older .doc \
                 files are not supported; re-save it as .docx or export the transcript as .txt."
                    .to_string(),
            ));
        }

        if self.mode == ParseMode::Heuristic {
            return self.extract_heuristic(data, None);
        }

        let mut structural_rejection = None;
        match panic::catch_unwind(AssertUnwindSafe(|| parse_structural(data))) {
            Ok(Ok(text)) => {
                if self.readability.is_readable(&text) {
                    debug!(chars = text.len(), "DOCX extraction succeeded");
                    return Ok(RecoveredText::new(text, "document-xml"));
                }
                if !text.is_empty() {
                    structural_rejection = Some(readability_ratio(&text));
                }
                debug!("document.xml held no readable text, trying heuristics");
            }
            Ok(Err(e)) => debug!("Could not parse DOCX structure, trying heuristics: {}", e),
            Err(_) => warn!("DOCX parser panicked, trying heuristics"),
        }

        self.extract_heuristic(data, structural_rejection)
    }
}

// ============================================================================
// Structural parsing
// ============================================================================

/// Stream `word/document.xml` and collect its text, one line per paragraph.
fn parse_structural(data: &[u8]) -> Result<String, String> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(data)).map_err(|e| format!("invalid ZIP archive: {e}"))?;
    let document = archive
        .by_name("word/document.xml")
        .map_err(|e| format!("word/document.xml not found: {e}"))?;

    let mut reader = Reader::from_reader(BufReader::new(document));
    let mut buf = Vec::with_capacity(1024);
    let mut content = String::with_capacity(8192);
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"t" => in_text = true,
                b"tab" => content.push('\t'),
                b"br" | b"cr" => content.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => content.push('\t'),
                b"br" | b"cr" | b"p" => content.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => {
                let text = e.unescape().map_err(|e| format!("bad text node: {e}"))?;
                content.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => content.push('\n'),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "malformed XML at position {}: {e}",
                    reader.buffer_position()
                ))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(normalize_paragraphs(&content))
}

/// Clean each line and drop empty paragraphs.
fn normalize_paragraphs(content: &str) -> String {
    content
        .lines()
        .map(clean_fragment)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// Heuristic cascade
// ============================================================================

fn heuristic_cascade(config: &ExtractConfig) -> Cascade {
    Cascade::new()
        .with_stage(FnStage::new("text-runs", text_runs))
        .with_stage(FnStage::new("xml-text", xml_text))
        .with_stage(FnStage::new("properties", properties))
        .with_stage(FnStage::new("attribute-values", attribute_values))
        .with_stage(AsciiRunStage {
            min_run_len: config.min_run_len,
            min_total_len: config.min_text_len,
        })
}

/// Raw bytes followed by every deflated local entry that inflates.
fn build_corpus(data: &[u8]) -> Vec<u8> {
    let mut corpus = data.to_vec();
    let mut inflated_total = 0usize;
    let mut offset = 0;

    while let Some(pos) = find(&data[offset..], LOCAL_HEADER) {
        let header = offset + pos;
        offset = header + LOCAL_HEADER.len();

        if inflated_total >= MAX_INFLATED_TOTAL {
            debug!("Inflated entry budget reached");
            break;
        }
        let Some(fixed) = data.get(header..header + LOCAL_HEADER_LEN) else {
            break;
        };

        let method = u16::from_le_bytes([fixed[8], fixed[9]]);
        let name_len = usize::from(u16::from_le_bytes([fixed[26], fixed[27]]));
        let extra_len = usize::from(u16::from_le_bytes([fixed[28], fixed[29]]));
        let payload = header + LOCAL_HEADER_LEN + name_len + extra_len;

        // stored entries are already visible in the raw bytes
        if method != 8 {
            continue;
        }
        let Some(body) = data.get(payload..) else { continue };
        if let Some(inflated) = inflate_raw(body) {
            inflated_total += inflated.len();
            corpus.push(b'\n');
            corpus.extend_from_slice(&inflated);
        }
    }

    corpus
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Stage 1: `<w:t>` run text, with paragraph ends, tabs and breaks as word breaks.
fn text_runs(corpus: &[u8]) -> Option<String> {
    let mut paragraphs = Vec::new();
    let mut current = String::new();

    for caps in TEXT_RUN_RE.captures_iter(corpus) {
        match caps.get(1) {
            Some(run) => current.push_str(&xml_unescape(&String::from_utf8_lossy(run.as_bytes()))),
            None if caps[0].starts_with(b"</w:p") => {
                paragraphs.push(std::mem::take(&mut current));
            }
            None => current.push(' '),
        }
    }
    paragraphs.push(current);

    join_fragments(paragraphs)
}

/// Stage 2: every XML text node that is clean UTF-8.
///
/// Spans between stray `>`/`<` bytes in compressed or binary data show up
/// as invalid UTF-8 or control characters and are skipped.
fn xml_text(corpus: &[u8]) -> Option<String> {
    join_fragments(
        XML_TEXT_RE
            .captures_iter(corpus)
            .filter_map(|caps| caps.get(1))
            .filter_map(|node| std::str::from_utf8(node.as_bytes()).ok())
            .filter(|node| !node.chars().any(|c| c.is_control() && !c.is_whitespace()))
            .map(xml_unescape),
    )
}

/// Stage 3: document properties (title, subject, description, keywords).
fn properties(corpus: &[u8]) -> Option<String> {
    join_fragments(
        PROPERTY_RE
            .captures_iter(corpus)
            .filter_map(|caps| caps.get(1))
            .map(|value| xml_unescape(&String::from_utf8_lossy(value.as_bytes())).into_owned()),
    )
}

/// Stage 4: string attribute values (`w:val`, and `descr`/`title` alt text).
///
/// Only values that read like prose are kept: a single token such as a
/// style id, a font name or `single` is markup, not text.
fn attribute_values(corpus: &[u8]) -> Option<String> {
    join_fragments(
        ATTRIBUTE_VALUE_RE
            .captures_iter(corpus)
            .filter_map(|caps| caps.get(1))
            .map(|value| xml_unescape(&String::from_utf8_lossy(value.as_bytes())).into_owned())
            .filter(|value| {
                value.trim().contains(' ') && value.chars().any(char::is_alphabetic)
            }),
    )
}

fn no_text_error() -> ExtractError {
    ExtractError::NoExtractableText(
        "No readable text could be extracted from this DOCX file. Likely causes: the document \
         only contains images (image-based or scanned pages; try running it through OCR), it is \
         encrypted or password-protected, or the file is corrupted. Try re-saving it from your \
         word processor or exporting the transcript as a .txt file."
            .to_string(),
    )
}
