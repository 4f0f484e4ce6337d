use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Default length of the opening window inspected for a hook, in seconds.
pub const DEFAULT_HOOK_WINDOW_SECONDS: f64 = 3.0;

/// Default number of keywords kept per analysis.
pub const DEFAULT_TOP_KEYWORDS: usize = 10;

/// Relative weights of the quality score components.
///
/// Each weight must be a finite, non-negative number and at least one must be
/// positive. The score is a weighted mean, so only the ratios matter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityWeights {
    pub regularity: f64,
    pub keyword_density: f64,
    pub hook: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            regularity: 0.4,
            keyword_density: 0.3,
            hook: 0.3,
        }
    }
}

impl QualityWeights {
    pub fn new(regularity: f64, keyword_density: f64, hook: f64) -> Result<Self, Error> {
        let weights = Self {
            regularity,
            keyword_density,
            hook,
        };
        weights.validate()?;
        Ok(weights)
    }

    pub fn total(&self) -> f64 {
        self.regularity + self.keyword_density + self.hook
    }

    pub fn validate(&self) -> Result<(), Error> {
        for (name, w) in [
            ("regularity", self.regularity),
            ("keyword_density", self.keyword_density),
            ("hook", self.hook),
        ] {
            if !w.is_finite() || w < 0.0 {
                return Err(Error::InvalidOption(format!(
                    "quality weight {name} must be a non-negative number, got {w}"
                )));
            }
        }
        if self.total() <= 0.0 {
            return Err(Error::InvalidOption(
                "at least one quality weight must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Options for one analysis call.
///
/// Immutable once built: every analysis is reproducible from its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOptions {
    pub hook_window_seconds: f64,
    pub top_keywords: usize,
    pub quality_weights: QualityWeights,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            hook_window_seconds: DEFAULT_HOOK_WINDOW_SECONDS,
            top_keywords: DEFAULT_TOP_KEYWORDS,
            quality_weights: QualityWeights::default(),
        }
    }
}

impl AnalysisOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the opening window. Must be a positive, finite number of seconds.
    pub fn hook_window_seconds(mut self, seconds: f64) -> Result<Self, Error> {
        self.hook_window_seconds = seconds;
        self.validate()?;
        Ok(self)
    }

    pub fn top_keywords(mut self, k: usize) -> Self {
        self.top_keywords = k;
        self
    }

    pub fn quality_weights(mut self, weights: QualityWeights) -> Result<Self, Error> {
        self.quality_weights = weights;
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !self.hook_window_seconds.is_finite() || self.hook_window_seconds <= 0.0 {
            return Err(Error::InvalidOption(format!(
                "hook window must be a positive number of seconds, got {}",
                self.hook_window_seconds
            )));
        }
        self.quality_weights.validate()
    }
}

/// A validated language for whisper transcription.
///
/// Accepts both short codes ("en", "zh") and full names ("english", "chinese").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Language {
    /// Auto-detect language from audio.
    #[default]
    Auto,
    /// A validated language code.
    Code {
        /// Short code as whisper expects it.
        code: String,
        /// Whisper internal language ID.
        id: i32,
    },
}

impl Language {
    /// Create a language from a code or full name, validating against whisper.cpp.
    pub fn new(lang: &str) -> Result<Self, Error> {
        let lower = lang.to_lowercase();
        if lower == "auto" {
            return Ok(Language::Auto);
        }

        match whisper_rs::get_lang_id(&lower) {
            Some(id) => {
                let code = whisper_rs::get_lang_str(id).unwrap_or(&lower).to_string();
                Ok(Language::Code { code, id })
            }
            None => Err(Error::UnsupportedLanguage(lang.to_string())),
        }
    }

    /// Short language code (e.g. "en"), or None for Auto.
    pub fn code(&self) -> Option<&str> {
        match self {
            Language::Auto => None,
            Language::Code { code, .. } => Some(code),
        }
    }

    /// All supported languages as (code, full_name) pairs.
    pub fn supported() -> Vec<(&'static str, &'static str)> {
        let max = whisper_rs::get_lang_max_id();
        (0..=max)
            .filter_map(|id| {
                let code = whisper_rs::get_lang_str(id)?;
                let name = whisper_rs::get_lang_str_full(id)?;
                Some((code, name))
            })
            .collect()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Auto => write!(f, "auto"),
            Language::Code { code, .. } => write!(f, "{code}"),
        }
    }
}

/// Whisper model sizes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Model {
    Tiny,
    Base,
    Small,
    Medium,
    LargeV3,
    LargeV3Turbo,
    /// User-provided .ggml file path.
    Custom(PathBuf),
}

impl Model {
    /// Model filename as used by HuggingFace / whisper.cpp.
    pub fn filename(&self) -> String {
        match self {
            Model::Tiny => "ggml-tiny.bin".into(),
            Model::Base => "ggml-base.bin".into(),
            Model::Small => "ggml-small.bin".into(),
            Model::Medium => "ggml-medium.bin".into(),
            Model::LargeV3 => "ggml-large-v3.bin".into(),
            Model::LargeV3Turbo => "ggml-large-v3-turbo.bin".into(),
            Model::Custom(path) => path
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_else(|| "custom-model".into()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Model::Tiny => "tiny",
            Model::Base => "base",
            Model::Small => "small",
            Model::Medium => "medium",
            Model::LargeV3 => "large-v3",
            Model::LargeV3Turbo => "large-v3-turbo",
            Model::Custom(_) => "custom",
        }
    }

    /// Parse a model size name (e.g. a CLI argument).
    pub fn parse_name(s: &str) -> Option<Self> {
        match s {
            "tiny" => Some(Model::Tiny),
            "base" => Some(Model::Base),
            "small" => Some(Model::Small),
            "medium" => Some(Model::Medium),
            "large" | "large-v3" => Some(Model::LargeV3),
            "large-v3-turbo" => Some(Model::LargeV3Turbo),
            _ => None,
        }
    }

    /// Approximate download size, for listings.
    pub fn approx_size(&self) -> &'static str {
        match self {
            Model::Tiny => "75 MB",
            Model::Base => "142 MB",
            Model::Small => "466 MB",
            Model::Medium => "1.5 GB",
            Model::LargeV3 => "2.9 GB",
            Model::LargeV3Turbo => "~1.6 GB",
            Model::Custom(_) => "-",
        }
    }

    pub fn all() -> [Model; 6] {
        [
            Model::Tiny,
            Model::Base,
            Model::Small,
            Model::Medium,
            Model::LargeV3,
            Model::LargeV3Turbo,
        ]
    }
}

/// Options handed to the transcription collaborator.
#[derive(Debug, Clone)]
pub struct TranscribeOptions {
    pub model: Model,
    pub language: Language,
    pub n_threads: Option<u32>,
    pub gpu: bool,
    pub beam_size: Option<u32>,
    pub cache_dir: Option<PathBuf>,
}

impl Default for TranscribeOptions {
    fn default() -> Self {
        Self {
            model: Model::Base,
            language: Language::Auto,
            n_threads: None,
            gpu: true,
            beam_size: None,
            cache_dir: None,
        }
    }
}

impl TranscribeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(mut self, model: Model) -> Self {
        self.model = model;
        self
    }

    /// Set the language. Accepts codes ("en", "zh") or full names ("english").
    pub fn language(mut self, lang: &str) -> Result<Self, Error> {
        self.language = Language::new(lang)?;
        Ok(self)
    }

    pub fn n_threads(mut self, n: u32) -> Result<Self, Error> {
        if n == 0 {
            return Err(Error::InvalidOption("n_threads must be at least 1".into()));
        }
        self.n_threads = Some(n);
        Ok(self)
    }

    pub fn gpu(mut self, enabled: bool) -> Self {
        self.gpu = enabled;
        self
    }

    pub fn beam_size(mut self, size: u32) -> Result<Self, Error> {
        if size == 0 {
            return Err(Error::InvalidOption("beam_size must be at least 1".into()));
        }
        self.beam_size = Some(size);
        Ok(self)
    }

    pub fn cache_dir(mut self, dir: PathBuf) -> Self {
        self.cache_dir = Some(dir);
        self
    }

    /// Resolve the model cache directory, defaulting to ~/.cache/vidscope/models.
    pub fn resolve_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from(".cache"))
                .join("vidscope")
                .join("models")
        })
    }
}
