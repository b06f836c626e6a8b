//! # scribe-core
//!
//! Core types and traits for scribe, the transcript text-extraction layer of
//! the meeting-minutes pipeline.
//!
//! Uploaded transcripts arrive as plain text, PDF or DOCX. Before any of them
//! can be summarized, their text has to be pulled out and judged readable.
//! This crate holds the vocabulary shared by every piece of that work:
//!
//! ```text
//! ExtractionRequest → FormatExtractor → (RecoveryStage cascade) → Validator
//!                                                                    ↓
//!                                                           ExtractionResult
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ExtractionRequest`] | Upload bytes plus MIME type and/or filename |
//! | [`ExtractionResult`] | Text, verdict, failure reason, page count |
//! | [`FailureKind`] | Closed failure taxonomy callers branch on |
//! | [`DocumentFormat`] | Plain text, PDF or DOCX |
//!
//! ## Key Traits
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`FormatExtractor`] | Extract text from one document format |
//! | [`RecoveryStage`] | One heuristic step in a fallback cascade |
//!
//! ## Related Crates
//!
//! - `scribe-extract`: extractor implementations, cascade, validator
//! - `scribe`: command-line harness

pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, ExtractError, Result};
pub use traits::*;
pub use types::*;
