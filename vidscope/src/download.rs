use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::batch::{Acquirer, MediaHandle, ScratchDir};
use crate::error::{Error, Result};
use crate::types::VideoMetadata;

/// Prefer a 720p-or-smaller stream; short-form analysis needs no more.
pub const DEFAULT_FORMAT: &str = "best[height<=720]/best";

const MEDIA_EXTENSIONS: &[&str] = &["mp4", "webm", "mkv", "mov", "m4a", "mp3", "opus", "wav"];

/// Fields read from `yt-dlp --dump-json`.
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    id: Option<String>,
    title: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    duration: Option<f64>,
    view_count: Option<u64>,
    like_count: Option<u64>,
    upload_date: Option<String>,
    webpage_url: Option<String>,
}

/// Fetches videos with yt-dlp into a per-item scratch directory.
#[derive(Debug, Clone)]
pub struct YtDlpAcquirer {
    format: String,
    work_dir: Option<PathBuf>,
    keep_media: bool,
}

impl Default for YtDlpAcquirer {
    fn default() -> Self {
        Self {
            format: DEFAULT_FORMAT.into(),
            work_dir: None,
            keep_media: false,
        }
    }
}

impl YtDlpAcquirer {
    pub fn new() -> Self {
        Self::default()
    }

    /// yt-dlp format selector.
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    /// Parent of the per-item scratch directories (default: system temp dir).
    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    /// Keep downloaded media after the item is done.
    pub fn keep_media(mut self, keep: bool) -> Self {
        self.keep_media = keep;
        self
    }

    async fn read_info(&self, url: &str) -> Result<YtDlpInfo> {
        let output = Command::new("yt-dlp")
            .args(["--dump-json", "--no-download", "--no-playlist", "--no-exec"])
            .arg(url)
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(unavailable(url, &stderr_excerpt(&output.stderr)));
        }
        serde_json::from_slice(&output.stdout)
            .map_err(|e| unavailable(url, &format!("unreadable yt-dlp metadata: {e}")))
    }

    async fn download(&self, url: &str, dir: &Path) -> Result<PathBuf> {
        let template = dir
            .join("%(id)s.%(ext)s")
            .to_str()
            .ok_or_else(|| unavailable(url, "scratch path contains invalid UTF-8"))?
            .to_string();

        let output = Command::new("yt-dlp")
            .args(["--format", &self.format, "--no-playlist", "--no-exec"])
            .args(["--output", &template, "--print", "after_move:filepath"])
            .arg(url)
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(unavailable(
                url,
                &format!("yt-dlp failed: {}", stderr_excerpt(&output.stderr)),
            ));
        }

        let printed = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let path = if printed.is_empty() {
            find_media_file(dir).ok_or_else(|| unavailable(url, "no media file after download"))?
        } else {
            let candidate = PathBuf::from(printed);
            if !is_path_in_dir(&candidate, dir) {
                warn!(path = %candidate.display(), dir = %dir.display(), "yt-dlp wrote outside scratch dir");
                return Err(unavailable(url, "downloaded file is outside the scratch directory"));
            }
            candidate
        };

        if !path.exists() {
            return Err(unavailable(
                url,
                &format!("downloaded file not found at {}", path.display()),
            ));
        }
        Ok(path)
    }
}

impl Acquirer for YtDlpAcquirer {
    async fn fetch(&self, identifier: &str) -> Result<(VideoMetadata, MediaHandle)> {
        let url = validate_url(identifier)?;

        let version = Command::new("yt-dlp")
            .arg("--version")
            .kill_on_drop(true)
            .output()
            .await;
        if version.is_err() {
            return Err(Error::YtDlpNotFound);
        }

        info!(%url, "reading video metadata");
        let metadata = metadata_from_info(self.read_info(url).await?, url)?;

        let parent = self.work_dir.clone().unwrap_or_else(std::env::temp_dir);
        let scratch = Arc::new(ScratchDir::create_in(&parent, "vidscope")?.keep(self.keep_media));

        info!(id = %metadata.id, format = %self.format, "downloading video");
        let path = self.download(url, scratch.path()).await?;
        debug!(path = %path.display(), "video downloaded");

        Ok((metadata, MediaHandle::in_scratch(path, scratch)))
    }
}

/// Only plain http(s) URLs reach yt-dlp.
fn validate_url(identifier: &str) -> Result<&str> {
    let trimmed = identifier.trim();
    if trimmed.starts_with("https://") || trimmed.starts_with("http://") {
        Ok(trimmed)
    } else {
        Err(unavailable(
            identifier,
            "not a URL (must start with http:// or https://)",
        ))
    }
}

fn metadata_from_info(info: YtDlpInfo, url: &str) -> Result<VideoMetadata> {
    let id = info
        .id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| unavailable(url, "yt-dlp reported no video id"))?;
    let author = info
        .uploader
        .or(info.channel)
        .unwrap_or_else(|| "unknown".into());

    let mut metadata = VideoMetadata::new(
        id,
        info.title.unwrap_or_else(|| "untitled".into()),
        author,
        info.duration.unwrap_or(0.0),
    )
    .map_err(|e| unavailable(url, &e.to_string()))?
    .source_url(info.webpage_url.unwrap_or_else(|| url.to_string()));

    if let Some(n) = info.view_count {
        metadata = metadata.view_count(n);
    }
    if let Some(n) = info.like_count {
        metadata = metadata.like_count(n);
    }
    if let Some(date) = info.upload_date {
        metadata = metadata.upload_date(date);
    }
    Ok(metadata)
}

fn unavailable(identifier: &str, reason: &str) -> Error {
    Error::SourceUnavailable {
        identifier: identifier.to_string(),
        reason: reason.to_string(),
    }
}

fn stderr_excerpt(stderr: &[u8]) -> String {
    String::from_utf8_lossy(stderr)
        .trim()
        .chars()
        .take(1000)
        .collect()
}

/// Resolve `.` and `..` lexically, without touching the filesystem.
fn normalize_path(path: &Path) -> PathBuf {
    use std::path::Component;
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                parts.pop();
            }
            Component::CurDir => {}
            other => parts.push(other),
        }
    }
    parts.iter().collect()
}

fn is_path_in_dir(path: &Path, dir: &Path) -> bool {
    let dir = dir.canonicalize().unwrap_or_else(|_| normalize_path(dir));
    let path = path.canonicalize().unwrap_or_else(|_| normalize_path(path));
    path.starts_with(dir)
}

/// Newest media file in `dir`, used when yt-dlp does not print the final path.
fn find_media_file(dir: &Path) -> Option<PathBuf> {
    std::fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| MEDIA_EXTENSIONS.contains(&ext))
        })
        .filter_map(|e| Some((e.metadata().ok()?.modified().ok()?, e.path())))
        .max_by_key(|(modified, _)| *modified)
        .map(|(_, path)| path)
}
