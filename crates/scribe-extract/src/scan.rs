//! Byte-level scanning helpers shared by the heuristic stages.
//!
//! Nothing here understands a container format. These functions find
//! literal strings, printable runs and deflate payloads in arbitrary bytes,
//! and normalize whatever they find into single-spaced text.

use flate2::read::{DeflateDecoder, ZlibDecoder};
use std::borrow::Cow;
use std::io::Read;

/// Upper bound on inflated bytes per payload.
const MAX_INFLATED_PAYLOAD: u64 = 16 * 1024 * 1024;

/// Upper bound on inflated bytes added to one corpus.
pub const MAX_INFLATED_TOTAL: usize = 64 * 1024 * 1024;

/// Strip non-printable characters, collapse whitespace runs and trim.
#[must_use]
pub fn clean_fragment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;

    for c in raw.chars() {
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if c.is_control() || c == char::REPLACEMENT_CHARACTER {
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(c);
    }

    out
}

/// Clean each fragment and join the non-empty ones with single spaces.
///
/// Returns `None` when nothing survives cleaning.
#[must_use]
pub fn join_fragments<I, S>(fragments: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined = fragments
        .into_iter()
        .map(|f| clean_fragment(f.as_ref()))
        .filter(|f| !f.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

// ============================================================================
// PDF literal strings
// ============================================================================

/// Read a PDF literal string whose opening parenthesis is at `start`.
///
/// Handles balanced nested parentheses and backslash escapes. Returns the
/// decoded bytes and the index just past the closing parenthesis, or `None`
/// if the string is unterminated.
#[must_use]
pub fn read_pdf_literal(bytes: &[u8], start: usize) -> Option<(Vec<u8>, usize)> {
    if bytes.get(start) != Some(&b'(') {
        return None;
    }

    let mut out = Vec::new();
    let mut depth = 1usize;
    let mut i = start + 1;

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'\\' => {
                i += 1;
                let Some(&next) = bytes.get(i) else { break };
                match next {
                    b'n' => out.push(b'\n'),
                    b'r' => out.push(b'\r'),
                    b't' => out.push(b'\t'),
                    b'b' => out.push(0x08),
                    b'f' => out.push(0x0C),
                    b'(' | b')' | b'\\' => out.push(next),
                    b'0'..=b'7' => {
                        let mut value: u32 = 0;
                        let mut digits = 0;
                        while digits < 3 {
                            match bytes.get(i) {
                                Some(&d @ b'0'..=b'7') => {
                                    value = value * 8 + u32::from(d - b'0');
                                    i += 1;
                                    digits += 1;
                                }
                                _ => break,
                            }
                        }
                        #[allow(clippy::cast_possible_truncation)]
                        out.push((value & 0xFF) as u8);
                        continue;
                    }
                    // line continuation
                    b'\r' => {
                        if bytes.get(i + 1) == Some(&b'\n') {
                            i += 1;
                        }
                    }
                    b'\n' => {}
                    other => out.push(other),
                }
            }
            b'(' => {
                depth += 1;
                out.push(b);
            }
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some((out, i + 1));
                }
                out.push(b);
            }
            _ => out.push(b),
        }
        i += 1;
    }

    None
}

/// Decode PDF string bytes: UTF-16BE when BOM-marked, Latin-1 otherwise.
#[must_use]
pub fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE_u8, 0xFF][..]) {
        let (text, _) = encoding_rs::UTF_16BE.decode_without_bom_handling(rest);
        return text.into_owned();
    }
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// All literal strings in `region`, decoded.
#[must_use]
pub fn pdf_literals(region: &[u8]) -> Vec<String> {
    let mut literals = Vec::new();
    let mut i = 0;

    while i < region.len() {
        if region[i] == b'(' {
            if let Some((raw, end)) = read_pdf_literal(region, i) {
                literals.push(decode_pdf_string(&raw));
                i = end;
                continue;
            }
            // unterminated: nothing further can close it
            break;
        }
        i += 1;
    }

    literals
}

// ============================================================================
// XML text
// ============================================================================

/// Resolve XML entity and character references.
///
/// Text that quick-xml refuses to unescape (a bare `&`, an unknown entity)
/// is kept as it appears in the file.
#[must_use]
pub fn xml_unescape(raw: &str) -> Cow<'_, str> {
    quick_xml::escape::unescape(raw).unwrap_or(Cow::Borrowed(raw))
}

// ============================================================================
// Printable runs
// ============================================================================

/// Characters allowed inside a blind-scan run.
fn is_run_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b' ' | b'.' | b',' | b'!' | b'?' | b';' | b':' | b'\'' | b'"' | b'(' | b')' | b'-'
        )
}

/// Whether a run reads like words rather than numbers or operators.
///
/// Letters must make up at least half of the non-space characters, which
/// drops xref rows, coordinate lists and content-stream operator soup.
fn looks_like_words(run: &[u8]) -> bool {
    let (letters, others) = run.iter().fold((0usize, 0usize), |(l, o), &b| {
        if b.is_ascii_alphabetic() {
            (l + 1, o)
        } else if b == b' ' {
            (l, o)
        } else {
            (l, o + 1)
        }
    });
    letters > 0 && letters >= others
}

/// Runs of at least `min_len` consecutive run-class bytes that look like words.
#[must_use]
pub fn ascii_runs(corpus: &[u8], min_len: usize) -> Vec<String> {
    let min_len = min_len.max(1);
    let mut runs = Vec::new();

    for run in corpus.split(|&b| !is_run_byte(b)) {
        if run.len() >= min_len && looks_like_words(run) {
            runs.push(String::from_utf8_lossy(run).into_owned());
        }
    }

    runs
}

// ============================================================================
// Deflate payloads
// ============================================================================

fn read_capped(reader: impl Read) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    match reader.take(MAX_INFLATED_PAYLOAD).read_to_end(&mut out) {
        Ok(_) if !out.is_empty() => Some(out),
        // a truncated stream still yields whatever inflated cleanly
        Err(_) if !out.is_empty() => Some(out),
        _ => None,
    }
}

/// Inflate a zlib-wrapped payload (PDF `FlateDecode`).
#[must_use]
pub fn inflate_zlib(data: &[u8]) -> Option<Vec<u8>> {
    // zlib header: CM = 8 and header checksum
    let header = data.get(..2)?;
    if header[0] & 0x0F != 8 || (u16::from(header[0]) << 8 | u16::from(header[1])) % 31 != 0 {
        return None;
    }
    read_capped(ZlibDecoder::new(data))
}

/// Inflate a raw deflate payload (ZIP method 8).
#[must_use]
pub fn inflate_raw(data: &[u8]) -> Option<Vec<u8>> {
    read_capped(DeflateDecoder::new(data))
}
