//! Error types for scribe.

use thiserror::Error;

use crate::types::FailureKind;

/// Main error type for scribe operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Content extraction failed
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractError),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Content extraction errors.
///
/// These never cross the public `extract` boundary as errors: the registry
/// folds them into a failed [`ExtractionResult`](crate::ExtractionResult)
/// via [`ExtractError::kind`] and the `Display` message.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error(
        "Unsupported file type ({0}). Upload the transcript as a plain-text (.txt), PDF or DOCX file."
    )]
    UnsupportedFormat(String),

    #[error("{0}")]
    Decode(String),

    #[error("{0}")]
    NoExtractableText(String),

    #[error("{message}")]
    ReadabilityRejected { ratio: f64, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("extraction failed: {0}")]
    Failed(String),
}

impl ExtractError {
    /// The failure kind reported to callers for this error.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::UnsupportedFormat(_) => FailureKind::UnsupportedFormat,
            Self::Decode(_) | Self::Io(_) | Self::Failed(_) => FailureKind::DecodeError,
            Self::NoExtractableText(_) => FailureKind::NoExtractableText,
            Self::ReadabilityRejected { .. } => FailureKind::ReadabilityRejected,
        }
    }
}

/// Result type alias for scribe operations.
pub type Result<T> = std::result::Result<T, Error>;
