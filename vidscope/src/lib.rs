//! Structural analysis of short-form videos: transcript in, hook, pacing and
//! content signals out.
//!
//! **vidscope** turns a timestamped transcript plus basic video metadata into
//! an [`AnalysisRecord`], and renders it as a JSON document and a Markdown
//! report. A [`BatchRunner`] drives the full pipeline (download via yt-dlp,
//! audio extraction via ffmpeg, transcription via whisper.cpp) over many
//! videos, isolating failures per item.
//!
//! # Quick start
//!
//! ```rust
//! use vidscope::{analyze, render, AnalysisOptions, Transcript, VideoMetadata};
//!
//! # fn main() -> vidscope::Result<()> {
//! let metadata = VideoMetadata::new("abc123", "One simple trick", "Jo", 5.0)?;
//! let transcript = Transcript::from_triples(
//!     [
//!         (0.0, 1.0, "Did you know this?"),
//!         (1.0, 3.0, "this simple trick saves time"),
//!         (3.0, 5.0, "let me show you how"),
//!     ],
//!     "en",
//! )?;
//!
//! let record = analyze(metadata, transcript, &AnalysisOptions::default())?;
//! assert_eq!(record.hook().category.as_str(), "question-hook");
//!
//! let report = render(&record)?;
//! println!("{}", report.markdown);
//! # Ok(())
//! # }
//! ```
//!
//! # Batch
//!
//! ```rust,no_run
//! # #[tokio::main]
//! # async fn main() -> vidscope::Result<()> {
//! use vidscope::{BatchRunner, FfmpegExtractor, WhisperTranscriber, YtDlpAcquirer};
//!
//! let runner = BatchRunner::new(
//!     YtDlpAcquirer::new(),
//!     FfmpegExtractor::new(),
//!     WhisperTranscriber::new(),
//! )
//! .output_dir("output");
//!
//! let report = runner.run(["https://www.youtube.com/shorts/abc123"]).await;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod batch;
pub mod config;
#[cfg(feature = "download")]
pub mod download;
pub mod error;
pub mod hook;
pub mod model;
pub mod pacing;
pub mod report;
pub mod signals;
pub mod transcribe;
pub mod types;

pub use audio::FfmpegExtractor;
pub use batch::{
    run_blocking, Acquirer, AudioExtractor, AudioHandle, BatchReport, BatchResult, BatchRunner,
    BatchSummary, MediaHandle, ScratchDir, Transcriber,
};
pub use config::{AnalysisOptions, Language, Model, QualityWeights, TranscribeOptions};
#[cfg(feature = "download")]
pub use download::YtDlpAcquirer;
pub use error::{Error, ErrorKind, Result};
pub use hook::{classify_hook, HookCategory, HookResult, HookRule};
pub use pacing::{analyze_pacing, PacingMetrics, RhythmLabel};
pub use report::{
    analyze, analyze_at, render, write_report, AnalysisRecord, RecordBuilder, RenderedReport,
    ReportPaths,
};
pub use signals::{extract_signals, ContentSignals, Keyword, Sentiment};
pub use transcribe::WhisperTranscriber;
pub use types::{Segment, Transcript, VideoMetadata};
