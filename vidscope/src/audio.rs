use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, info};

use crate::batch::{AudioExtractor, AudioHandle, MediaHandle};
use crate::error::{Error, Result};

/// Sample rate whisper.cpp expects.
pub const WHISPER_SAMPLE_RATE: u32 = 16_000;

/// Audio longer than this is refused rather than decoded into memory.
const MAX_AUDIO_DURATION_SECS: f64 = 2.0 * 3600.0;

/// RMS below this counts as silence.
const MIN_RMS: f32 = 1e-4;

/// Extracts a 16 kHz mono PCM WAV track with ffmpeg.
#[derive(Debug, Clone)]
pub struct FfmpegExtractor {
    binary: PathBuf,
}

impl Default for FfmpegExtractor {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("ffmpeg"),
        }
    }
}

impl FfmpegExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific ffmpeg executable instead of the one on `PATH`.
    pub fn binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.binary = path.into();
        self
    }
}

impl AudioExtractor for FfmpegExtractor {
    async fn extract_audio(&self, media: &MediaHandle) -> Result<AudioHandle> {
        let input = media.path();
        if !input.exists() {
            return Err(Error::ExtractionFailed(format!(
                "media file not found: {}",
                input.display()
            )));
        }

        let dir = match media.scratch() {
            Some(scratch) => scratch.path().to_path_buf(),
            None => input
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        };
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".into());
        let output = dir.join(format!("{stem}.16k.wav"));

        info!(input = %input.display(), "extracting audio track");

        let result = Command::new(&self.binary)
            .args(["-nostdin", "-y", "-loglevel", "error", "-i"])
            .arg(input)
            .args([
                "-vn",
                "-ac",
                "1",
                "-ar",
                &WHISPER_SAMPLE_RATE.to_string(),
                "-acodec",
                "pcm_s16le",
            ])
            .arg(&output)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ffmpeg_spawn_error(&e))?;

        if !result.status.success() {
            return Err(Error::ExtractionFailed(format!(
                "ffmpeg failed: {}",
                truncate_stderr(&result.stderr)
            )));
        }
        if !output.exists() {
            return Err(Error::ExtractionFailed(
                "ffmpeg reported success but wrote no audio".into(),
            ));
        }

        debug!(path = %output.display(), "audio extracted");
        Ok(match media.scratch() {
            Some(scratch) => AudioHandle::in_scratch(output, scratch.clone()),
            None => AudioHandle::new(output),
        })
    }
}

/// Decode any audio file to 16 kHz mono f32 samples via ffmpeg.
///
/// ffmpeg emits raw signed 16-bit little-endian PCM which is scaled to [-1, 1].
pub async fn decode_samples(path: &Path) -> Result<Vec<f32>> {
    if !path.exists() {
        return Err(Error::TranscriptionFailed(format!(
            "audio file not found: {}",
            path.display()
        )));
    }

    let output = Command::new("ffmpeg")
        .args(["-nostdin", "-threads", "0", "-i"])
        .arg(path)
        .args([
            "-f",
            "s16le",
            "-ac",
            "1",
            "-acodec",
            "pcm_s16le",
            "-ar",
            &WHISPER_SAMPLE_RATE.to_string(),
            "-",
        ])
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| Error::TranscriptionFailed(format!("failed to run ffmpeg: {e}")))?;

    if !output.status.success() {
        return Err(Error::TranscriptionFailed(format!(
            "ffmpeg decode failed: {}",
            truncate_stderr(&output.stderr)
        )));
    }

    let samples = pcm_s16le_to_f32(&output.stdout);
    let duration = samples.len() as f64 / WHISPER_SAMPLE_RATE as f64;
    if duration > MAX_AUDIO_DURATION_SECS {
        return Err(Error::TranscriptionFailed(format!(
            "audio too long ({duration:.0}s); the limit is {MAX_AUDIO_DURATION_SECS:.0}s"
        )));
    }

    debug!(samples = samples.len(), duration_secs = format!("{duration:.1}"), "decoded audio");
    Ok(samples)
}

fn pcm_s16le_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]) as f32 / 32768.0)
        .collect()
}

/// True when there is nothing worth transcribing.
pub fn is_silent(samples: &[f32]) -> bool {
    rms(samples) < MIN_RMS
}

fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

fn ffmpeg_spawn_error(e: &std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::NotFound {
        Error::ExtractionFailed("ffmpeg not found; install with: apt install ffmpeg".into())
    } else {
        Error::ExtractionFailed(format!("failed to run ffmpeg: {e}"))
    }
}

/// Keep error messages bounded; ffmpeg can be verbose.
fn truncate_stderr(stderr: &[u8]) -> String {
    String::from_utf8_lossy(stderr)
        .trim()
        .chars()
        .take(1000)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm_conversion() {
        let bytes = [0x00, 0x00, 0xff, 0x7f, 0x00, 0x80, 0x01];
        let samples = pcm_s16le_to_f32(&bytes);
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0], 0.0);
        assert!((samples[1] - 32767.0 / 32768.0).abs() < 1e-6);
        assert_eq!(samples[2], -1.0);
    }

    #[test]
    fn test_rms() {
        assert_eq!(rms(&[]), 0.0);
        assert!((rms(&[0.5, -0.5, 0.5, -0.5]) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_is_silent() {
        assert!(is_silent(&[]));
        assert!(is_silent(&[0.0; 1600]));
        assert!(!is_silent(&[0.2, -0.3, 0.1]));
    }

    #[test]
    fn test_truncate_stderr() {
        let long = vec![b'x'; 5000];
        assert_eq!(truncate_stderr(&long).len(), 1000);
        assert_eq!(truncate_stderr(b"  oops \n"), "oops");
    }

    #[tokio::test]
    async fn test_extract_missing_media() {
        let media = MediaHandle::new("/nonexistent/video.mp4");
        let err = FfmpegExtractor::new().extract_audio(&media).await.unwrap_err();
        assert!(matches!(err, Error::ExtractionFailed(_)));
    }

    #[tokio::test]
    async fn test_extract_rejects_non_media_file() {
        let tmp = std::env::temp_dir().join("vidscope_test_not_media.txt");
        std::fs::write(&tmp, "this is not a video").unwrap();

        let media = MediaHandle::new(&tmp);
        let err = FfmpegExtractor::new().extract_audio(&media).await.unwrap_err();
        assert!(matches!(err, Error::ExtractionFailed(_)));

        std::fs::remove_file(&tmp).ok();
    }

    #[tokio::test]
    async fn test_missing_ffmpeg_binary() {
        let tmp = std::env::temp_dir().join("vidscope_test_media_for_missing_ffmpeg.mp4");
        std::fs::write(&tmp, b"x").unwrap();

        let extractor = FfmpegExtractor::new().binary("/nonexistent/ffmpeg");
        let err = extractor
            .extract_audio(&MediaHandle::new(&tmp))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("ffmpeg not found"));

        std::fs::remove_file(&tmp).ok();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_abandoned_extraction_kills_ffmpeg() {
        use std::os::unix::fs::PermissionsExt;

        let dir = std::env::temp_dir().join("vidscope_test_kill_on_drop");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        let fake = dir.join("fake-ffmpeg");
        std::fs::write(&fake, "#!/bin/sh\nsleep 1\ntouch \"$0.ran\"\n").unwrap();
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();
        let media = dir.join("clip.mp4");
        std::fs::write(&media, b"x").unwrap();

        let extractor = FfmpegExtractor::new().binary(&fake);
        let handle = MediaHandle::new(&media);
        let abandoned = tokio::time::timeout(
            std::time::Duration::from_millis(100),
            extractor.extract_audio(&handle),
        )
        .await;
        assert!(abandoned.is_err());

        tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
        assert!(!dir.join("fake-ffmpeg.ran").exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_decode_missing_file() {
        let err = decode_samples(Path::new("/nonexistent/audio.wav"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TranscriptionFailed(_)));
    }
}
