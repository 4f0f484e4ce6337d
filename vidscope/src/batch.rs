//! Sequential batch processing with per-item failure isolation.
//!
//! Each identifier goes through acquire, extract, transcribe, analyze and
//! (optionally) report writing. A failing item becomes a failure entry and the
//! batch moves on; the report always holds exactly one result per input.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Serialize, Serializer};
use tracing::{info, info_span, warn, Instrument};

use crate::config::{AnalysisOptions, TranscribeOptions};
use crate::error::{Error, ErrorKind, Result};
use crate::report::{analyze, write_report, AnalysisRecord, ReportPaths};
use crate::types::{Transcript, VideoMetadata};

/// Fetches a video and its metadata.
#[allow(async_fn_in_trait)]
pub trait Acquirer {
    async fn fetch(&self, identifier: &str) -> Result<(VideoMetadata, MediaHandle)>;
}

/// Pulls an audio track out of fetched media.
#[allow(async_fn_in_trait)]
pub trait AudioExtractor {
    async fn extract_audio(&self, media: &MediaHandle) -> Result<AudioHandle>;
}

/// Turns audio into a timestamped transcript.
#[allow(async_fn_in_trait)]
pub trait Transcriber {
    async fn transcribe(
        &self,
        audio: &AudioHandle,
        options: &TranscribeOptions,
    ) -> Result<Transcript>;
}

/// Run CPU-bound work (model loading, decoding) on the blocking pool.
///
/// Collaborators must not block inside their async fns: the item timeout is
/// only observed while the pipeline future yields.
pub async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(std::io::Error::from)?
}

/// A per-item working directory, removed on drop unless kept.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    keep: bool,
}

impl ScratchDir {
    /// Create a fresh directory under `parent`, unique per process and call.
    pub fn create_in(parent: &Path, prefix: &str) -> Result<Self> {
        let path = parent.join(format!(
            "{prefix}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ));
        std::fs::create_dir_all(&path)?;
        Ok(Self { path, keep: false })
    }

    /// Create a fresh directory under the system temp dir.
    pub fn create(prefix: &str) -> Result<Self> {
        Self::create_in(&std::env::temp_dir(), prefix)
    }

    /// Leave the directory in place when dropped.
    pub fn keep(mut self, keep: bool) -> Self {
        self.keep = keep;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if self.keep || !self.path.exists() {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to clean up scratch dir");
        }
    }
}

/// Fetched media on local disk.
#[derive(Debug, Clone)]
pub struct MediaHandle {
    path: PathBuf,
    scratch: Option<Arc<ScratchDir>>,
}

impl MediaHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            scratch: None,
        }
    }

    /// Media living in `scratch`; the directory outlives every handle sharing it.
    pub fn in_scratch(path: impl Into<PathBuf>, scratch: Arc<ScratchDir>) -> Self {
        Self {
            path: path.into(),
            scratch: Some(scratch),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn scratch(&self) -> Option<&Arc<ScratchDir>> {
        self.scratch.as_ref()
    }
}

/// Extracted audio on local disk.
#[derive(Debug, Clone)]
pub struct AudioHandle {
    path: PathBuf,
    scratch: Option<Arc<ScratchDir>>,
}

impl AudioHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            scratch: None,
        }
    }

    pub fn in_scratch(path: impl Into<PathBuf>, scratch: Arc<ScratchDir>) -> Self {
        Self {
            path: path.into(),
            scratch: Some(scratch),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn scratch(&self) -> Option<&Arc<ScratchDir>> {
        self.scratch.as_ref()
    }
}

/// Outcome for one input identifier.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchResult {
    Success {
        identifier: String,
        #[serde(skip)]
        record: Box<AnalysisRecord>,
        reports: Option<ReportPaths>,
    },
    Failure {
        identifier: String,
        kind: ErrorKind,
        message: String,
    },
}

impl BatchResult {
    pub fn identifier(&self) -> &str {
        match self {
            BatchResult::Success { identifier, .. } | BatchResult::Failure { identifier, .. } => {
                identifier
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BatchResult::Success { .. })
    }

    pub fn record(&self) -> Option<&AnalysisRecord> {
        match self {
            BatchResult::Success { record, .. } => Some(record),
            BatchResult::Failure { .. } => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            BatchResult::Success { .. } => None,
            BatchResult::Failure { kind, .. } => Some(*kind),
        }
    }
}

/// Aggregate counts of a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} failed ({} total)",
            self.succeeded, self.failed, self.total
        )
    }
}

/// Ordered results of a batch run, one per input.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    results: Vec<BatchResult>,
}

impl BatchReport {
    pub fn results(&self) -> &[BatchResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            total: self.len(),
            succeeded: self.succeeded(),
            failed: self.failed(),
        }
    }

    /// True when there was at least one input and none succeeded.
    pub fn all_failed(&self) -> bool {
        !self.is_empty() && self.succeeded() == 0
    }
}

impl FromIterator<BatchResult> for BatchReport {
    fn from_iter<I: IntoIterator<Item = BatchResult>>(iter: I) -> Self {
        Self {
            results: iter.into_iter().collect(),
        }
    }
}

impl Serialize for BatchReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Doc<'a> {
            summary: BatchSummary,
            results: &'a [BatchResult],
        }
        Doc {
            summary: self.summary(),
            results: &self.results,
        }
        .serialize(serializer)
    }
}

/// Failure of one item, already classified by stage.
struct StageFailure {
    kind: ErrorKind,
    message: String,
}

impl StageFailure {
    /// Errors raised inside a collaborator stage take that stage's kind.
    fn at(kind: ErrorKind) -> impl Fn(Error) -> StageFailure {
        move |e| StageFailure {
            kind,
            message: e.to_string(),
        }
    }
}

impl From<Error> for StageFailure {
    fn from(e: Error) -> Self {
        StageFailure {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

/// Runs the full pipeline over a list of identifiers.
pub struct BatchRunner<A, X, T> {
    acquirer: A,
    extractor: X,
    transcriber: T,
    analysis: AnalysisOptions,
    transcribe: TranscribeOptions,
    output_dir: Option<PathBuf>,
    item_timeout: Option<Duration>,
}

impl<A, X, T> BatchRunner<A, X, T>
where
    A: Acquirer,
    X: AudioExtractor,
    T: Transcriber,
{
    pub fn new(acquirer: A, extractor: X, transcriber: T) -> Self {
        Self {
            acquirer,
            extractor,
            transcriber,
            analysis: AnalysisOptions::default(),
            transcribe: TranscribeOptions::default(),
            output_dir: None,
            item_timeout: None,
        }
    }

    pub fn analysis(mut self, options: AnalysisOptions) -> Result<Self> {
        options.validate()?;
        self.analysis = options;
        Ok(self)
    }

    pub fn transcribe(mut self, options: TranscribeOptions) -> Self {
        self.transcribe = options;
        self
    }

    /// Write the JSON record, Markdown report and SRT subtitles for each success
    /// into `dir`.
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Abandon an item that takes longer than `limit` end to end.
    pub fn item_timeout(mut self, limit: Duration) -> Result<Self> {
        if limit.is_zero() {
            return Err(Error::InvalidOption("item timeout must be positive".into()));
        }
        self.item_timeout = Some(limit);
        Ok(self)
    }

    /// Process every identifier in order.
    pub async fn run<I, S>(&self, identifiers: I) -> BatchReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut results = Vec::new();
        for identifier in identifiers {
            results.push(self.process(identifier.as_ref()).await);
        }

        let report = BatchReport::from_iter(results);
        info!(summary = %report.summary(), "batch finished");
        report
    }

    /// Process one identifier. Never fails: errors become a failure entry.
    pub async fn process(&self, identifier: &str) -> BatchResult {
        let span = info_span!("item", %identifier);
        self.process_item(identifier).instrument(span).await
    }

    async fn process_item(&self, identifier: &str) -> BatchResult {
        let outcome = match self.item_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.pipeline(identifier)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(StageFailure::from(Error::Timeout {
                    seconds: limit.as_secs_f64(),
                })),
            },
            None => self.pipeline(identifier).await,
        };

        match outcome {
            Ok((record, reports)) => {
                info!(
                    hook = %record.hook().category,
                    quality = record.signals().quality_score,
                    "item succeeded"
                );
                BatchResult::Success {
                    identifier: identifier.to_string(),
                    record: Box::new(record),
                    reports,
                }
            }
            Err(failure) => {
                warn!(kind = %failure.kind, error = %failure.message, "item failed");
                BatchResult::Failure {
                    identifier: identifier.to_string(),
                    kind: failure.kind,
                    message: failure.message,
                }
            }
        }
    }

    async fn pipeline(
        &self,
        identifier: &str,
    ) -> std::result::Result<(AnalysisRecord, Option<ReportPaths>), StageFailure> {
        info!("acquiring");
        let (metadata, media) = self
            .acquirer
            .fetch(identifier)
            .await
            .map_err(StageFailure::at(ErrorKind::SourceUnavailable))?;

        info!(path = %media.path().display(), "extracting audio");
        let audio = self
            .extractor
            .extract_audio(&media)
            .await
            .map_err(StageFailure::at(ErrorKind::ExtractionFailed))?;

        info!(model = %self.transcribe.model.name(), "transcribing");
        let transcript = self
            .transcriber
            .transcribe(&audio, &self.transcribe)
            .await
            .map_err(StageFailure::at(ErrorKind::TranscriptionFailed))?;

        let record = analyze(metadata, transcript, &self.analysis)?;
        let reports = match &self.output_dir {
            Some(dir) => Some(write_report(&record, dir)?),
            None => None,
        };
        Ok((record, reports))
    }
}
