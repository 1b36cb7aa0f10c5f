//! Error types for Audiobook Master
//!
//! This module defines error types using thiserror for ergonomic error handling.
//! Errors are categorized by the stage that raises them (discovery, probing,
//! remediation, tagging, configuration) so the pipeline can decide whether a
//! failure affects one file or the whole run.
//!
//! ## Failure Scope
//!
//! ### Per-file, degraded (never abort an analysis)
//! - `ProbeFailed` - a single attribute could not be read; the record falls
//!   back to a sentinel value (0 / mono / unknown duration)
//!
//! ### Per-file, skipped (batch continues)
//! - `ConversionFailed` - ffmpeg exited non-zero while remediating a file
//! - `TagWriteFailed` - tags could not be written; the encoded file is kept
//! - `VisualizationFailed` - waveform or loudness image could not be drawn
//!
//! ### Discovery (re-prompt or clean exit)
//! - `DirectoryNotFound`, `NoAudioFiles`
//!
//! ### Run-level
//! - `FfmpegNotFound`, `OutputIsInput`, `InvalidConfiguration`, `ConfigParse`, `Io`

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our MasteringError type
pub type Result<T> = std::result::Result<T, MasteringError>;

/// Main error type for Audiobook Master
#[derive(Error, Debug)]
pub enum MasteringError {
    // ===== Discovery Errors =====

    /// Input directory does not exist or is not a directory
    #[error("Directory '{0}' does not exist")]
    DirectoryNotFound(PathBuf),

    /// Directory exists but holds no MP3 or WAV files
    #[error("No MP3 or WAV files found in {0}")]
    NoAudioFiles(PathBuf),

    // ===== Probe Errors =====

    /// A single attribute could not be probed
    #[error("Could not probe {attribute} for {}: {message}", path.display())]
    ProbeFailed {
        path: PathBuf,
        /// Attribute name (duration, bitrate, sample rate, channels)
        attribute: &'static str,
        message: String,
    },

    // ===== Audio/Conversion Errors =====

    /// Encoder exited non-zero for one file
    #[error("Audio conversion failed for {}: {message}", path.display())]
    ConversionFailed {
        path: PathBuf,
        /// Encoder diagnostic output
        message: String,
    },

    /// Writing metadata tags failed
    #[error("Error updating metadata for {}: {message}", path.display())]
    TagWriteFailed { path: PathBuf, message: String },

    /// Waveform or loudness rendering failed
    #[error("Error generating visualizations for {}: {message}", path.display())]
    VisualizationFailed { path: PathBuf, message: String },

    /// FFmpeg execution error
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// FFmpeg binary not found in PATH
    #[error("FFmpeg not found. Please install FFmpeg and ensure it's in your PATH.")]
    FfmpegNotFound,

    /// File extension is not one of the accepted source formats
    #[error("Unsupported audio format: {0}")]
    UnsupportedAudioFormat(String),

    // ===== File Errors =====

    /// Generic file I/O error with operation context
    #[error("File I/O error: {0}")]
    FileIoError(String),

    /// Invalid file path
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    // ===== Configuration Errors =====

    /// Output directory resolves to the input directory
    #[error("Output directory '{0}' is the input directory")]
    OutputIsInput(PathBuf),

    /// Requirement set or loudness target rejected
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// TOML configuration file could not be parsed
    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // ===== General Errors =====

    /// Run interrupted by the user
    #[error("Operation interrupted")]
    Interrupted,

    /// JSON output from ffprobe could not be decoded
    #[error("JSON serialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl MasteringError {
    /// Create a ProbeFailed error
    pub fn probe_failed<S: Into<String>>(
        path: impl Into<PathBuf>,
        attribute: &'static str,
        message: S,
    ) -> Self {
        MasteringError::ProbeFailed {
            path: path.into(),
            attribute,
            message: message.into(),
        }
    }

    /// Create a ConversionFailed error
    pub fn conversion_failed<S: Into<String>>(path: impl Into<PathBuf>, message: S) -> Self {
        MasteringError::ConversionFailed {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a FileIoError tagged with the failing operation and path
    pub fn file_io(operation: &str, path: &std::path::Path, err: std::io::Error) -> Self {
        MasteringError::FileIoError(format!("{}: {} - {}", operation, path.display(), err))
    }

    /// Discovery failures are recoverable by asking for another directory
    pub fn is_discovery_error(&self) -> bool {
        matches!(
            self,
            MasteringError::DirectoryNotFound(_) | MasteringError::NoAudioFiles(_)
        )
    }

    /// Errors that only affect a single file and never stop the batch
    pub fn is_file_scoped(&self) -> bool {
        matches!(
            self,
            MasteringError::ProbeFailed { .. }
                | MasteringError::ConversionFailed { .. }
                | MasteringError::TagWriteFailed { .. }
                | MasteringError::VisualizationFailed { .. }
        )
    }

    /// Get user-friendly error message suitable for display
    pub fn user_message(&self) -> String {
        match self {
            MasteringError::FfmpegNotFound => {
                "ffmpeg is not installed or not in PATH. Please install ffmpeg.\n\
                 On macOS with Homebrew: brew install ffmpeg\n\
                 On Ubuntu/Debian: sudo apt-get install ffmpeg\n\
                 On Windows: download from https://ffmpeg.org/download.html"
                    .to_string()
            }
            MasteringError::DirectoryNotFound(dir) => {
                format!("Directory '{}' does not exist. Please try again.", dir.display())
            }
            MasteringError::NoAudioFiles(_) => {
                "No MP3 or WAV files found in the specified directory. Please try again."
                    .to_string()
            }
            MasteringError::OutputIsInput(dir) => format!(
                "Output directory '{}' is the input directory. Choose a different output directory so the source files are kept.",
                dir.display()
            ),
            MasteringError::ConversionFailed { message, .. } => {
                format!("Error running ffmpeg: {}", message.trim())
            }
            _ => self.to_string(),
        }
    }
}
