//! Process-wide extraction configuration.
//!
//! Call [`init`] once at startup, before the first extraction. Code that never
//! calls it gets [`ExtractConfig::default`]. Tests should not touch the global
//! and build an [`ExtractorRegistry`](crate::ExtractorRegistry) from an explicit
//! config instead.

use scribe_core::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::OnceLock;
use tracing::debug;

use crate::validate::{ReadabilityCheck, DEFAULT_MIN_READABLE_LEN, DEFAULT_READABILITY_THRESHOLD};

static GLOBAL: OnceLock<ExtractConfig> = OnceLock::new();

/// How binary containers (PDF, DOCX) are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    /// Real parser first, heuristic cascade as fallback
    #[default]
    Structural,
    /// Heuristic cascade only
    Heuristic,
}

/// Extraction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Parser mode for PDF and DOCX
    #[serde(default)]
    pub mode: ParseMode,

    /// Reject inputs larger than this (bytes); `None` disables the ceiling.
    /// Config files spell `None` as `0`, since TOML has no null.
    #[serde(
        default = "default_max_input_bytes",
        deserialize_with = "deserialize_ceiling",
        serialize_with = "serialize_ceiling"
    )]
    pub max_input_bytes: Option<usize>,

    /// Minimum total length of blind ASCII-run matches
    #[serde(default = "default_min_text_len")]
    pub min_text_len: usize,

    /// Minimum length of a single ASCII run
    #[serde(default = "default_min_run_len")]
    pub min_run_len: usize,

    /// Readable-character ratio that must be exceeded
    #[serde(default = "default_readability_threshold")]
    pub readability_threshold: f64,

    /// Character count that must be exceeded
    #[serde(default = "default_min_readable_len")]
    pub min_readable_len: usize,
}

fn default_max_input_bytes() -> Option<usize> {
    Some(52_428_800) // 50MB
}

fn deserialize_ceiling<'de, D: Deserializer<'de>>(d: D) -> Result<Option<usize>, D::Error> {
    Ok(Option::<usize>::deserialize(d)?.filter(|&max| max > 0))
}

fn serialize_ceiling<S: Serializer>(max: &Option<usize>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(max.map_or(0, |max| max as u64))
}

fn default_min_text_len() -> usize {
    50
}

fn default_min_run_len() -> usize {
    15
}

fn default_readability_threshold() -> f64 {
    DEFAULT_READABILITY_THRESHOLD
}

fn default_min_readable_len() -> usize {
    DEFAULT_MIN_READABLE_LEN
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            mode: ParseMode::default(),
            max_input_bytes: default_max_input_bytes(),
            min_text_len: default_min_text_len(),
            min_run_len: default_min_run_len(),
            readability_threshold: default_readability_threshold(),
            min_readable_len: default_min_readable_len(),
        }
    }
}

impl ExtractConfig {
    /// Same settings with a different parse mode.
    #[must_use]
    pub fn with_mode(mut self, mode: ParseMode) -> Self {
        self.mode = mode;
        self
    }

    /// Readability thresholds derived from this config.
    #[must_use]
    pub fn readability(&self) -> ReadabilityCheck {
        ReadabilityCheck {
            threshold: self.readability_threshold,
            min_len: self.min_readable_len,
        }
    }

    /// Check the values for obvious mistakes.
    pub fn validate(&self) -> Result<(), Error> {
        if !(0.0..=1.0).contains(&self.readability_threshold) {
            return Err(Error::Config(format!(
                "readability_threshold must be between 0 and 1, got {}",
                self.readability_threshold
            )));
        }
        if self.min_run_len == 0 {
            return Err(Error::Config("min_run_len must be > 0".to_string()));
        }
        if self.max_input_bytes == Some(0) {
            return Err(Error::Config(
                "max_input_bytes must be > 0 (use None to disable the ceiling)".to_string(),
            ));
        }
        Ok(())
    }
}

/// Install the process-wide configuration.
///
/// Fails if the config is invalid or if `init` already ran.
pub fn init(config: ExtractConfig) -> Result<(), Error> {
    config.validate()?;
    GLOBAL
        .set(config)
        .map_err(|_| Error::Config("extraction config already initialized".to_string()))?;
    debug!("Extraction config initialized");
    Ok(())
}

/// The process-wide configuration, or the defaults if [`init`] never ran.
pub fn get() -> &'static ExtractConfig {
    GLOBAL.get_or_init(ExtractConfig::default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ExtractConfig::default();
        assert_eq!(config.mode, ParseMode::Structural);
        assert_eq!(config.max_input_bytes, Some(52_428_800));
        assert_eq!(config.min_text_len, 50);
        assert_eq!(config.min_run_len, 15);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_with_mode() {
        let config = ExtractConfig::default().with_mode(ParseMode::Heuristic);
        assert_eq!(config.mode, ParseMode::Heuristic);
    }

    #[test]
    fn test_readability_from_config() {
        let config = ExtractConfig {
            readability_threshold: 0.5,
            min_readable_len: 3,
            ..Default::default()
        };
        let check = config.readability();
        assert!((check.threshold - 0.5).abs() < f64::EPSILON);
        assert_eq!(check.min_len, 3);
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let config = ExtractConfig {
            readability_threshold: 1.5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_run_len() {
        let config = ExtractConfig {
            min_run_len: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_ceiling() {
        let config = ExtractConfig {
            max_input_bytes: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_init_rejects_invalid_config_without_installing_it() {
        let bad = ExtractConfig {
            min_run_len: 0,
            ..Default::default()
        };
        assert!(init(bad).is_err());
        assert!(get().validate().is_ok());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ExtractConfig = serde_json::from_str(r#"{"mode":"heuristic"}"#).unwrap();
        assert_eq!(config.mode, ParseMode::Heuristic);
        assert_eq!(config.min_text_len, 50);
    }

    #[test]
    fn test_deserialize_null_ceiling_disables_it() {
        let config: ExtractConfig =
            serde_json::from_str(r#"{"max_input_bytes":null}"#).unwrap();
        assert_eq!(config.max_input_bytes, None);
    }

    #[test]
    fn test_zero_ceiling_in_file_disables_it() {
        let config: ExtractConfig = serde_json::from_str(r#"{"max_input_bytes":0}"#).unwrap();
        assert_eq!(config.max_input_bytes, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_disabled_ceiling_serializes_as_zero() {
        let config = ExtractConfig {
            max_input_bytes: None,
            ..Default::default()
        };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["max_input_bytes"], 0);

        let back: ExtractConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }
}
