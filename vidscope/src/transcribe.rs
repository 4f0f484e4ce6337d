use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, info};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::audio::{decode_samples, is_silent};
use crate::batch::{run_blocking, AudioHandle, Transcriber};
use crate::config::{Language, TranscribeOptions};
use crate::error::{Error, Result};
use crate::model::ensure_model;
use crate::types::{Segment, Transcript};

/// Whisper timestamps are in centiseconds.
const TIMESTAMP_SCALE: f64 = 100.0;

/// Transcribes with whisper.cpp, keeping the last loaded model in memory so a
/// batch pays the load cost once.
///
/// Model loading and decoding run on tokio's blocking pool.
#[derive(Default)]
pub struct WhisperTranscriber {
    loaded: Arc<Mutex<Option<LoadedModel>>>,
}

struct LoadedModel {
    path: PathBuf,
    gpu: bool,
    ctx: Arc<WhisperContext>,
}

impl WhisperTranscriber {
    pub fn new() -> Self {
        Self::default()
    }
}

fn load_context(
    cache: &Mutex<Option<LoadedModel>>,
    model_path: &Path,
    gpu: bool,
) -> Result<Arc<WhisperContext>> {
    let mut loaded = cache
        .lock()
        .map_err(|_| Error::Model("model cache lock poisoned".into()))?;

    if let Some(model) = loaded.as_ref() {
        if model.path == model_path && model.gpu == gpu {
            return Ok(Arc::clone(&model.ctx));
        }
    }

    info!(model = %model_path.display(), "loading whisper model");
    let mut ctx_params = WhisperContextParameters::new();
    ctx_params.use_gpu(gpu);
    let ctx = Arc::new(WhisperContext::new_with_params(
        model_path
            .to_str()
            .ok_or_else(|| Error::Model("model path contains invalid UTF-8".into()))?,
        ctx_params,
    )?);

    *loaded = Some(LoadedModel {
        path: model_path.to_path_buf(),
        gpu,
        ctx: Arc::clone(&ctx),
    });
    Ok(ctx)
}

impl Transcriber for WhisperTranscriber {
    async fn transcribe(
        &self,
        audio: &AudioHandle,
        options: &TranscribeOptions,
    ) -> Result<Transcript> {
        let cache_dir = options.resolve_cache_dir();
        let model_path = ensure_model(&options.model, &cache_dir).await?;

        let samples = decode_samples(audio.path()).await?;
        if is_silent(&samples) {
            info!(path = %audio.path().display(), "audio is silent, skipping whisper");
            return Ok(Transcript::empty(
                options.language.code().unwrap_or("unknown"),
            ));
        }

        let cache = Arc::clone(&self.loaded);
        let options = options.clone();
        run_blocking(move || {
            let ctx = load_context(&cache, &model_path, options.gpu)?;
            transcribe_samples(&ctx, &samples, &options)
        })
        .await
    }
}

/// Run whisper over 16 kHz mono samples and build a validated transcript.
pub fn transcribe_samples(
    ctx: &WhisperContext,
    samples: &[f32],
    options: &TranscribeOptions,
) -> Result<Transcript> {
    let mut state = ctx.create_state()?;

    let mut params = match options.beam_size {
        Some(beam_size) => FullParams::new(SamplingStrategy::BeamSearch {
            beam_size: beam_size as i32,
            patience: -1.0,
        }),
        None => FullParams::new(SamplingStrategy::Greedy { best_of: 5 }),
    };

    match &options.language {
        Language::Auto => params.set_detect_language(true),
        Language::Code { code, .. } => params.set_language(Some(code)),
    }

    if let Some(n) = options.n_threads {
        params.set_n_threads(n as i32);
    }

    params.set_print_progress(false);
    params.set_print_realtime(false);
    params.set_print_timestamps(false);

    info!(samples = samples.len(), "running transcription");
    state.full(params, samples)?;

    let num_segments = state.full_n_segments();
    let mut raw = Vec::with_capacity(num_segments.max(0) as usize);
    for i in 0..num_segments {
        let segment = state
            .get_segment(i)
            .ok_or_else(|| Error::TranscriptionFailed(format!("segment {i} not found")))?;
        let text = segment
            .to_str_lossy()
            .map_err(|e| Error::TranscriptionFailed(format!("segment text error: {e}")))?
            .into_owned();
        raw.push((
            segment.start_timestamp() as f64 / TIMESTAMP_SCALE,
            segment.end_timestamp() as f64 / TIMESTAMP_SCALE,
            text,
        ));
    }

    let language = match &options.language {
        Language::Code { code, .. } => code.clone(),
        Language::Auto => whisper_rs::get_lang_str(state.full_lang_id_from_state())
            .unwrap_or("unknown")
            .to_string(),
    };

    let segments = normalize_segments(raw);
    debug!(segments = segments.len(), %language, "transcription complete");
    Transcript::new(segments, language)
}

/// Make raw decoder output satisfy the transcript invariants.
///
/// Blank and bracketed non-speech segments (`[Music]`, `(applause)`) are
/// dropped, a start that overlaps its predecessor is moved to the
/// predecessor's end, and segments left with no duration are dropped.
fn normalize_segments(raw: Vec<(f64, f64, String)>) -> Vec<Segment> {
    let mut segments: Vec<Segment> = Vec::with_capacity(raw.len());
    for (start, end, text) in raw {
        let text = text.trim();
        if text.is_empty() || is_non_speech(text) {
            continue;
        }
        let floor = segments.last().map_or(0.0, |s| s.end);
        let start = start.max(floor);
        if end <= start {
            continue;
        }
        segments.push(Segment::new(start, end, text));
    }
    segments
}

fn is_non_speech(text: &str) -> bool {
    (text.starts_with('[') && text.ends_with(']'))
        || (text.starts_with('(') && text.ends_with(')'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(items: &[(f64, f64, &str)]) -> Vec<(f64, f64, String)> {
        items
            .iter()
            .map(|&(s, e, t)| (s, e, t.to_string()))
            .collect()
    }

    #[test]
    fn test_normalize_drops_blank_and_non_speech() {
        let segments = normalize_segments(raw(&[
            (0.0, 1.0, " [Music] "),
            (1.0, 2.0, "   "),
            (2.0, 3.0, " hello there "),
            (3.0, 4.0, "(applause)"),
        ]));
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "hello there");
        assert_eq!(segments[0].start, 2.0);
    }

    #[test]
    fn test_normalize_resolves_overlap() {
        let segments = normalize_segments(raw(&[
            (0.0, 2.5, "first"),
            (2.0, 4.0, "second"),
            (3.0, 3.5, "swallowed"),
        ]));
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].start, 2.5);
        assert_eq!(segments[1].end, 4.0);
        assert!(Transcript::new(segments, "en").is_ok());
    }

    #[test]
    fn test_normalize_drops_zero_length() {
        let segments = normalize_segments(raw(&[(1.0, 1.0, "blip"), (1.0, 2.0, "ok")]));
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "ok");
    }

    #[test]
    fn test_non_speech_markers() {
        assert!(is_non_speech("[BLANK_AUDIO]"));
        assert!(is_non_speech("(music)"));
        assert!(!is_non_speech("[laughs] that was fun"));
    }

    #[test]
    fn test_failed_load_leaves_cache_empty() {
        let cache = Mutex::new(None);
        assert!(load_context(&cache, Path::new("/nonexistent/ggml-base.bin"), false).is_err());
        assert!(cache.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_custom_model() {
        let options = TranscribeOptions::new()
            .model(crate::config::Model::Custom(PathBuf::from("/nonexistent/model.bin")));
        let err = WhisperTranscriber::new()
            .transcribe(&AudioHandle::new("/nonexistent/audio.wav"), &options)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ModelNotFound { .. }));
    }
}
