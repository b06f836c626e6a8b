//! Readability check for extracted text.
//!
//! The heuristic extractors will happily recover font tables and metadata
//! noise. The readability ratio (share of letters, digits, whitespace and
//! common punctuation) is the gate that keeps that noise away from callers.

use serde::{Deserialize, Serialize};

/// Punctuation counted as readable besides letters, digits and whitespace.
const READABLE_PUNCTUATION: &[char] = &['.', ',', '!', '?', ';', ':', '\'', '"', '(', ')', '-'];

/// Default minimum share of readable characters (exclusive).
pub const DEFAULT_READABILITY_THRESHOLD: f64 = 0.70;

/// Default minimum length in characters (exclusive).
pub const DEFAULT_MIN_READABLE_LEN: usize = 10;

/// Thresholds for [`ReadabilityCheck::is_readable`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReadabilityCheck {
    /// Ratio must be strictly greater than this
    pub threshold: f64,
    /// Character count must be strictly greater than this
    pub min_len: usize,
}

impl Default for ReadabilityCheck {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_READABILITY_THRESHOLD,
            min_len: DEFAULT_MIN_READABLE_LEN,
        }
    }
}

impl ReadabilityCheck {
    /// Whether `text` looks like meaningful content.
    #[must_use]
    pub fn is_readable(&self, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        text.chars().count() > self.min_len && readability_ratio(text) > self.threshold
    }
}

/// Whether a single character belongs to the readable class.
#[must_use]
pub fn is_readable_char(c: char) -> bool {
    c.is_alphabetic() || c.is_numeric() || c.is_whitespace() || READABLE_PUNCTUATION.contains(&c)
}

/// Fraction of characters in `text` that belong to the readable class.
///
/// Returns `0.0` for empty text.
#[must_use]
pub fn readability_ratio(text: &str) -> f64 {
    let (total, readable) = text.chars().fold((0usize, 0usize), |(total, readable), c| {
        (total + 1, readable + usize::from(is_readable_char(c)))
    });

    if total == 0 {
        return 0.0;
    }

    #[allow(clippy::cast_precision_loss)]
    {
        readable as f64 / total as f64
    }
}

/// Whether `text` is meaningful content, using the default thresholds.
#[must_use]
pub fn is_readable(text: &str) -> bool {
    ReadabilityCheck::default().is_readable(text)
}
