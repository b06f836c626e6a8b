//! # scribe CLI
//!
//! Command-line harness for the scribe transcript extractor.
//!
//! ## Commands
//!
//! - `scribe extract <FILES>...` - Extract text from transcripts (txt, PDF, DOCX)
//! - `scribe check <FILE>` - Readability report for a text file
//! - `scribe config show|init|path` - Inspect configuration
//!
//! ## Examples
//!
//! ```bash
//! # Extract a PDF transcript
//! scribe extract standup.pdf
//!
//! # Several files at once, as JSON
//! scribe --format json extract notes.txt minutes.docx
//!
//! # Skip the structural parsers
//! scribe extract --mode heuristic broken.pdf
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scribe_core::{ExtractionRequest, ExtractionResult, FailureKind};
use scribe_extract::{ExtractorRegistry, ParseMode};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "scribe")]
#[command(about = "Recover plain text from meeting transcripts")]
#[command(version)]
struct Cli {
    /// Path to config file (default: ~/.config/scribe/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum ModeArg {
    Structural,
    Heuristic,
}

impl From<ModeArg> for ParseMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Structural => Self::Structural,
            ModeArg::Heuristic => Self::Heuristic,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Extract text from one or more transcript files
    Extract {
        /// Files to extract
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Declared MIME type (default: guess from the extension)
        #[arg(long)]
        mime: Option<String>,

        /// Parser mode for PDF and DOCX (overrides the config file)
        #[arg(long)]
        mode: Option<ModeArg>,

        /// Skip the readability check
        #[arg(long)]
        raw: bool,
    },

    /// Report how readable a text file is
    Check {
        /// File to check
        file: PathBuf,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Print sample configuration file
    Init,
    /// Show config file path
    Path,
}

/// Output structure for one extracted file.
#[derive(Serialize)]
struct FileOutput {
    file: String,
    #[serde(flatten)]
    result: ExtractionResult,
}

/// Output structure for the readability check.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckOutput {
    file: String,
    readable: bool,
    ratio: f64,
    chars: usize,
}

/// Extract one file on its own task.
async fn extract_one(
    registry: Arc<ExtractorRegistry>,
    path: PathBuf,
    mime: Option<String>,
    raw: bool,
) -> ExtractionResult {
    if !raw {
        return registry.extract_file(&path, mime.as_deref()).await;
    }

    let data = match tokio::fs::read(&path).await {
        Ok(data) => data,
        Err(e) => {
            return ExtractionResult::failure(
                None,
                FailureKind::DecodeError,
                format!("Could not read {}: {e}", path.display()),
            )
        }
    };

    let mut request = ExtractionRequest::new(data);
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        request = request.with_file_name(name);
    }
    if let Some(mime) = mime {
        request = request.with_mime_type(mime);
    }

    tokio::task::spawn_blocking(move || registry.extract(&request))
        .await
        .unwrap_or_else(|e| {
            ExtractionResult::failure(
                None,
                FailureKind::DecodeError,
                format!("Extraction task failed: {e}"),
            )
        })
}

fn print_result(path: &Path, result: &ExtractionResult, with_header: bool) {
    if with_header {
        println!("==> {} <==", path.display());
    }
    match &result.failure {
        None => {
            if let Some(pages) = result.page_count {
                debug!("{}: {} pages", path.display(), pages);
            }
            println!("{}", result.text);
        }
        Some(failure) => {
            eprintln!("{}: {}: {}", path.display(), failure.kind, failure.message);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load_from(cli.config.clone()).context("Failed to load config")?;

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        config.logging.level()
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    match cli.command {
        Commands::Extract {
            files,
            mime,
            mode,
            raw,
        } => {
            let mut extract_config = config.extract.clone();
            if let Some(mode) = mode {
                extract_config.mode = mode.into();
            }
            scribe_extract::config::init(extract_config)?;
            let registry = Arc::new(ExtractorRegistry::with_config(
                scribe_extract::config::get(),
            ));

            info!("Extracting {} file(s)", files.len());

            let handles: Vec<_> = files
                .iter()
                .map(|path| {
                    tokio::spawn(extract_one(
                        registry.clone(),
                        path.clone(),
                        mime.clone(),
                        raw,
                    ))
                })
                .collect();

            let mut results = Vec::with_capacity(handles.len());
            for (path, handle) in files.iter().zip(handles) {
                let result = handle.await.context("Extraction task panicked")?;
                results.push((path, result));
            }

            let failed = results.iter().filter(|(_, r)| !r.succeeded).count();

            match cli.format {
                OutputFormat::Json => {
                    let output: Vec<FileOutput> = results
                        .into_iter()
                        .map(|(path, result)| FileOutput {
                            file: path.to_string_lossy().to_string(),
                            result,
                        })
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Text => {
                    let with_header = results.len() > 1;
                    for (path, result) in &results {
                        print_result(path, result, with_header);
                    }
                }
            }

            if failed > 0 {
                anyhow::bail!("{failed} of {} file(s) could not be extracted", files.len());
            }
        }

        Commands::Check { file } => {
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let text = String::from_utf8_lossy(&bytes);
            let check = config.extract.readability();

            let output = CheckOutput {
                file: file.to_string_lossy().to_string(),
                readable: check.is_readable(&text),
                ratio: scribe_extract::readability_ratio(&text),
                chars: text.chars().count(),
            };

            match cli.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Text => {
                    println!("Readability of {}", file.display());
                    println!("  Readable: {}", if output.readable { "yes" } else { "no" });
                    println!("  Ratio:    {:.1}%", output.ratio * 100.0);
                    println!("  Chars:    {}", output.chars);
                }
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => match cli.format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&config)
                            .context("Failed to serialize config")?
                    );
                }
                OutputFormat::Text => {
                    println!(
                        "{}",
                        toml::to_string_pretty(&config).context("Failed to serialize config")?
                    );
                }
            },
            ConfigAction::Init => {
                println!("{}", Config::sample_toml());
            }
            ConfigAction::Path => {
                if let Some(path) = Config::config_path() {
                    println!("{}", path.display());
                } else {
                    println!("Could not determine config directory");
                }
            }
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::tempdir;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_extract_args() {
        let cli = Cli::parse_from([
            "scribe", "-f", "json", "extract", "a.pdf", "b.txt", "--mode", "heuristic", "--raw",
        ]);
        assert!(matches!(cli.format, OutputFormat::Json));
        match cli.command {
            Commands::Extract {
                files, mode, raw, ..
            } => {
                assert_eq!(files.len(), 2);
                assert!(matches!(mode, Some(ModeArg::Heuristic)));
                assert!(raw);
            }
            _ => panic!("expected extract command"),
        }
    }

    #[test]
    fn test_extract_requires_files() {
        assert!(Cli::try_parse_from(["scribe", "extract"]).is_err());
    }

    #[tokio::test]
    async fn test_extract_one_raw_skips_validation() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("noise.txt");
        std::fs::write(&path, [0x01u8, 0x02, 0x03, 0x04, 0x05]).unwrap();

        let registry = Arc::new(ExtractorRegistry::with_config(&Default::default()));

        let raw = extract_one(registry.clone(), path.clone(), None, true).await;
        assert!(raw.succeeded);

        let validated = extract_one(registry, path, None, false).await;
        assert_eq!(
            validated.failure_kind(),
            Some(FailureKind::ReadabilityRejected)
        );
    }

    #[tokio::test]
    async fn test_extract_one_missing_file() {
        let registry = Arc::new(ExtractorRegistry::with_config(&Default::default()));
        let result = extract_one(registry, PathBuf::from("/nonexistent.txt"), None, true).await;
        assert_eq!(result.failure_kind(), Some(FailureKind::DecodeError));
    }
}
