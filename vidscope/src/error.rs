use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// All errors that can occur in vidscope.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid segment #{index}: {reason}")]
    InvalidSegment { index: usize, reason: String },

    #[error("segments out of order: segment #{index} starts before its predecessor")]
    UnsortedSegments { index: usize },

    #[error("source unavailable for {identifier}: {reason}")]
    SourceUnavailable { identifier: String, reason: String },

    #[cfg(feature = "download")]
    #[error("yt-dlp not found; install with: pip install yt-dlp")]
    YtDlpNotFound,

    #[error("audio extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("model error: {0}")]
    Model(String),

    #[error("model not found: {path}")]
    ModelNotFound { path: PathBuf },

    #[error("model download failed: {0}")]
    ModelDownload(String),

    #[error("unsupported language: \"{0}\"; use Language::supported() to list valid codes")]
    UnsupportedLanguage(String),

    #[error("whisper error: {0}")]
    Whisper(#[from] whisper_rs::WhisperError),

    #[error("incomplete analysis: missing {missing}")]
    IncompleteAnalysis { missing: &'static str },

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("timed out after {seconds:.0}s")]
    Timeout { seconds: f64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Stable classification of an [`Error`], carried in batch failure entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidSegment,
    UnsortedSegments,
    SourceUnavailable,
    ExtractionFailed,
    TranscriptionFailed,
    IncompleteAnalysis,
    InvalidOption,
    Timeout,
    Io,
    Serialization,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidSegment => "invalid_segment",
            ErrorKind::UnsortedSegments => "unsorted_segments",
            ErrorKind::SourceUnavailable => "source_unavailable",
            ErrorKind::ExtractionFailed => "extraction_failed",
            ErrorKind::TranscriptionFailed => "transcription_failed",
            ErrorKind::IncompleteAnalysis => "incomplete_analysis",
            ErrorKind::InvalidOption => "invalid_option",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Io => "io",
            ErrorKind::Serialization => "serialization",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Classify this error. Model management (cache, download, whisper itself)
    /// belongs to the transcription stage.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidSegment { .. } => ErrorKind::InvalidSegment,
            Error::UnsortedSegments { .. } => ErrorKind::UnsortedSegments,
            Error::SourceUnavailable { .. } => ErrorKind::SourceUnavailable,
            #[cfg(feature = "download")]
            Error::YtDlpNotFound => ErrorKind::SourceUnavailable,
            Error::ExtractionFailed(_) => ErrorKind::ExtractionFailed,
            Error::TranscriptionFailed(_)
            | Error::Model(_)
            | Error::ModelNotFound { .. }
            | Error::ModelDownload(_)
            | Error::UnsupportedLanguage(_)
            | Error::Whisper(_)
            | Error::Http(_) => ErrorKind::TranscriptionFailed,
            Error::IncompleteAnalysis { .. } => ErrorKind::IncompleteAnalysis,
            Error::InvalidOption(_) => ErrorKind::InvalidOption,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::Io(_) => ErrorKind::Io,
            Error::Json(_) => ErrorKind::Serialization,
        }
    }
}
