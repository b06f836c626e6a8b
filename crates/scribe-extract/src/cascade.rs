//! Ordered fallback cascade of heuristic recovery stages.
//!
//! Stages run in registration order and the first one that yields non-empty
//! text ends the cascade. That text is then either accepted or rejected by
//! the readability check; a rejected stage never hands over to a later, less
//! targeted one.

use scribe_core::{DocumentFormat, ExtractError, RecoveryStage};
use tracing::debug;

use crate::scan::{ascii_runs, join_fragments};
use crate::validate::{readability_ratio, ReadabilityCheck};

/// Outcome of running a [`Cascade`].
#[derive(Debug, Clone, PartialEq)]
pub enum CascadeOutcome {
    /// A stage produced acceptable text
    Accepted { stage: String, text: String },
    /// The first stage with output produced mostly unreadable text
    Rejected { stage: String, ratio: f64 },
    /// No stage produced anything
    Exhausted,
}

/// An ordered list of recovery stages.
#[derive(Default)]
pub struct Cascade {
    stages: Vec<Box<dyn RecoveryStage>>,
}

impl Cascade {
    /// Create an empty cascade.
    #[must_use]
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Append a stage; it runs after every stage added before it.
    #[must_use]
    pub fn with_stage<S: RecoveryStage + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Stage names in run order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run stages in order until one yields text, then judge it with `check`.
    pub fn run(&self, corpus: &[u8], check: &ReadabilityCheck) -> CascadeOutcome {
        for stage in &self.stages {
            let Some(text) = stage.recover(corpus).filter(|t| !t.is_empty()) else {
                debug!(stage = stage.name(), "Stage found nothing");
                continue;
            };

            if check.is_readable(&text) {
                debug!(stage = stage.name(), chars = text.len(), "Stage recovered text");
                return CascadeOutcome::Accepted {
                    stage: stage.name().to_string(),
                    text,
                };
            }

            let ratio = readability_ratio(&text);
            debug!(stage = stage.name(), ratio, "Stage output failed readability check");
            return CascadeOutcome::Rejected {
                stage: stage.name().to_string(),
                ratio,
            };
        }

        CascadeOutcome::Exhausted
    }
}

// ============================================================================
// Stages
// ============================================================================

/// A stage backed by a plain function.
pub struct FnStage {
    name: &'static str,
    recover: fn(&[u8]) -> Option<String>,
}

impl FnStage {
    /// Create a named stage.
    #[must_use]
    pub const fn new(name: &'static str, recover: fn(&[u8]) -> Option<String>) -> Self {
        Self { name, recover }
    }
}

impl RecoveryStage for FnStage {
    fn name(&self) -> &str {
        self.name
    }

    fn recover(&self, corpus: &[u8]) -> Option<String> {
        (self.recover)(corpus)
    }
}

/// Blind scan for printable runs, the catch-all of last resort.
pub struct AsciiRunStage {
    /// Shortest run worth keeping
    pub min_run_len: usize,
    /// Shortest total (joined) text worth returning
    pub min_total_len: usize,
}

impl RecoveryStage for AsciiRunStage {
    fn name(&self) -> &str {
        "ascii-runs"
    }

    fn recover(&self, corpus: &[u8]) -> Option<String> {
        let text = join_fragments(ascii_runs(corpus, self.min_run_len))?;
        if text.chars().count() < self.min_total_len {
            debug!(
                chars = text.chars().count(),
                min = self.min_total_len,
                "ASCII runs below minimum length"
            );
            return None;
        }
        Some(text)
    }
}

// ============================================================================
// Failure messages
// ============================================================================

/// Error for text that was found but is mostly unreadable.
#[must_use]
pub fn readability_error(format: DocumentFormat, ratio: f64) -> ExtractError {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let percent = (ratio * 100.0).round() as u32;
    ExtractError::ReadabilityRejected {
        ratio,
        message: format!(
            "Some text was found in this {format} file, but only {percent}% of it is readable \
             characters, so it is most likely binary data (embedded fonts, images or metadata) \
             rather than the transcript. Try exporting the transcript as a plain .txt file."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nothing(_: &[u8]) -> Option<String> {
        None
    }

    fn empty(_: &[u8]) -> Option<String> {
        Some(String::new())
    }

    fn noise(_: &[u8]) -> Option<String> {
        Some("#$%^ &*@! ~~~~ <<>> [] {}".to_string())
    }

    fn worse_noise(_: &[u8]) -> Option<String> {
        Some("#$%^&*@~~~~<<>>[]{}".to_string())
    }

    fn words(_: &[u8]) -> Option<String> {
        Some("Minutes of the weekly sync".to_string())
    }

    fn other_words(_: &[u8]) -> Option<String> {
        Some("This stage must never run".to_string())
    }

    #[test]
    fn test_first_accepted_stage_wins() {
        let cascade = Cascade::new()
            .with_stage(FnStage::new("first", words))
            .with_stage(FnStage::new("second", other_words));

        let outcome = cascade.run(b"", &ReadabilityCheck::default());
        assert_eq!(
            outcome,
            CascadeOutcome::Accepted {
                stage: "first".to_string(),
                text: "Minutes of the weekly sync".to_string()
            }
        );
    }

    #[test]
    fn test_empty_stages_fall_through() {
        let cascade = Cascade::new()
            .with_stage(FnStage::new("none", nothing))
            .with_stage(FnStage::new("empty", empty))
            .with_stage(FnStage::new("words", words));

        match cascade.run(b"", &ReadabilityCheck::default()) {
            CascadeOutcome::Accepted { stage, .. } => assert_eq!(stage, "words"),
            other => panic!("expected accepted outcome, got {other:?}"),
        }
    }

    #[test]
    fn test_unreadable_output_stops_the_cascade() {
        let cascade = Cascade::new()
            .with_stage(FnStage::new("noise", noise))
            .with_stage(FnStage::new("words", words));

        match cascade.run(b"", &ReadabilityCheck::default()) {
            CascadeOutcome::Rejected { stage, ratio } => {
                assert_eq!(stage, "noise");
                assert!(ratio < 0.7);
            }
            other => panic!("expected rejected outcome, got {other:?}"),
        }
    }

    #[test]
    fn test_rejected_reports_first_stage_with_output() {
        let cascade = Cascade::new()
            .with_stage(FnStage::new("none", nothing))
            .with_stage(FnStage::new("worse", worse_noise))
            .with_stage(FnStage::new("noise", noise));

        match cascade.run(b"", &ReadabilityCheck::default()) {
            CascadeOutcome::Rejected { stage, ratio } => {
                assert_eq!(stage, "worse");
                assert!(ratio.abs() < f64::EPSILON);
            }
            other => panic!("expected rejected outcome, got {other:?}"),
        }
    }

    #[test]
    fn test_exhausted() {
        let cascade = Cascade::new()
            .with_stage(FnStage::new("none", nothing))
            .with_stage(FnStage::new("empty", empty));
        assert_eq!(
            cascade.run(b"", &ReadabilityCheck::default()),
            CascadeOutcome::Exhausted
        );
        assert_eq!(
            Cascade::new().run(b"", &ReadabilityCheck::default()),
            CascadeOutcome::Exhausted
        );
    }

    #[test]
    fn test_stage_names_preserve_order() {
        let cascade = Cascade::new()
            .with_stage(FnStage::new("a", nothing))
            .with_stage(FnStage::new("b", nothing))
            .with_stage(AsciiRunStage {
                min_run_len: 15,
                min_total_len: 50,
            });
        assert_eq!(cascade.stage_names(), vec!["a", "b", "ascii-runs"]);
    }

    #[test]
    fn test_ascii_run_stage_enforces_total_length() {
        let stage = AsciiRunStage {
            min_run_len: 15,
            min_total_len: 50,
        };
        assert_eq!(stage.recover(b"\x00Only one short sentence.\x00"), None);

        let corpus = b"\x00First sentence of the notes.\x01Second sentence of the notes.\x02";
        assert_eq!(
            stage.recover(corpus).as_deref(),
            Some("First sentence of the notes. Second sentence of the notes.")
        );
    }

    #[test]
    fn test_readability_error_message() {
        let err = readability_error(DocumentFormat::Pdf, 0.42);
        assert_eq!(err.kind(), scribe_core::FailureKind::ReadabilityRejected);
        let message = err.to_string();
        assert!(message.contains("PDF"));
        assert!(message.contains("42%"));
    }
}
