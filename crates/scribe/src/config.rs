//! Configuration file handling for the scribe CLI.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use scribe_extract::ExtractConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::Level;

const CONFIG_FILE: &str = "config.toml";

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Extraction configuration
    #[serde(default)]
    pub extract: ExtractConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LoggingConfig {
    /// Parsed level, falling back to INFO for unknown names.
    pub fn level(&self) -> Level {
        self.level.parse().unwrap_or(Level::INFO)
    }
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    /// A missing default file yields the defaults.
    ///
    /// An explicit path must exist; the default one is optional.
    pub fn load_from(path: Option<PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::read(&path),
            None => match Self::config_path() {
                Some(path) if path.exists() => Self::read(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.extract.validate()?;
        Ok(config)
    }

    /// Default config file path.
    pub fn config_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join(CONFIG_FILE))
    }

    /// A commented sample configuration file.
    pub fn sample_toml() -> &'static str {
        r#"# scribe configuration

[extract]
# "structural" tries the real PDF/DOCX parser first; "heuristic" only scans bytes
mode = "structural"
# Larger uploads are rejected (bytes); 0 disables the limit
max_input_bytes = 52428800
# Minimum total length of text recovered by the blind ASCII-run scan
min_text_len = 50
# Minimum length of a single ASCII run
min_run_len = 15
# Share of readable characters that must be exceeded
readability_threshold = 0.7
# Character count that must be exceeded
min_readable_len = 10

[logging]
level = "info"
"#
    }
}

/// Get the XDG config directory for scribe.
pub fn config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("SCRIBE_CONFIG_DIR") {
        return Some(PathBuf::from(dir));
    }

    ProjectDirs::from("", "", "scribe").map(|dirs| dirs.config_dir().to_path_buf())
}
