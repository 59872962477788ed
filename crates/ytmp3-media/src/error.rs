//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while fetching or transcoding audio.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("yt-dlp not found in PATH")]
    YtDlpNotFound,

    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("No audio stream found: {url}")]
    NoAudioStream { url: String },

    #[error("Metadata lookup failed: {message}")]
    ResolveFailed { message: String },

    #[error("Transfer failed: {message}")]
    FetchFailed { message: String },

    #[error("Conversion failed: {message}")]
    ConversionFailed {
        message: String,
        exit_code: Option<i32>,
    },

    #[error("FFprobe failed: {message}")]
    ProbeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl MediaError {
    /// Create a no-audio-stream error.
    pub fn no_audio_stream(url: impl Into<String>) -> Self {
        Self::NoAudioStream { url: url.into() }
    }

    /// Create a metadata lookup failure.
    pub fn resolve_failed(message: impl Into<String>) -> Self {
        Self::ResolveFailed {
            message: message.into(),
        }
    }

    /// Create a transfer failure.
    pub fn fetch_failed(message: impl Into<String>) -> Self {
        Self::FetchFailed {
            message: message.into(),
        }
    }

    /// Create a conversion failure.
    pub fn conversion_failed(message: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self::ConversionFailed {
            message: message.into(),
            exit_code,
        }
    }

    /// User-initiated cancellation is not a failure; it must not be written
    /// into a job record.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
