use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Transcript, VideoMetadata};

/// Rhythm variance below this is steady pacing.
pub const RHYTHM_LOW_MAX: f64 = 0.25;

/// Rhythm variance at or above this is highly variable pacing.
pub const RHYTHM_HIGH_MIN: f64 = 0.50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RhythmLabel {
    Low,
    Medium,
    High,
}

impl RhythmLabel {
    /// Band a dispersion coefficient: `[0, 0.25)` low, `[0.25, 0.5)` medium, rest high.
    pub fn from_variance(variance: f64) -> Self {
        if variance < RHYTHM_LOW_MAX {
            RhythmLabel::Low
        } else if variance < RHYTHM_HIGH_MIN {
            RhythmLabel::Medium
        } else {
            RhythmLabel::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RhythmLabel::Low => "low",
            RhythmLabel::Medium => "medium",
            RhythmLabel::High => "high",
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            RhythmLabel::Low => "steady pacing",
            RhythmLabel::Medium => "moderately varied pacing",
            RhythmLabel::High => "highly variable pacing",
        }
    }
}

impl fmt::Display for RhythmLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Speech-rate metrics. Rates are characters per minute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacingMetrics {
    /// Characters per minute over the transcript's covered duration.
    pub speech_rate: f64,
    /// Population standard deviation of per-segment rates divided by `speech_rate`.
    pub rhythm_variance: f64,
    pub rhythm: RhythmLabel,
    /// Characters per minute over the whole video, silence included.
    pub content_density: f64,
    pub total_chars: usize,
    pub word_count: usize,
    pub segment_count: usize,
    pub avg_segment_chars: f64,
    /// Fraction of the video covered by the transcript, 0 for a zero-length video.
    pub speech_coverage: f64,
}

/// Compute pacing metrics for `transcript` against the video's own duration.
pub fn analyze_pacing(transcript: &Transcript, metadata: &VideoMetadata) -> PacingMetrics {
    let total_chars = transcript.char_count();
    let covered = transcript.duration();
    let segment_count = transcript.segment_count();

    let speech_rate = per_minute(total_chars, covered);

    let local_rates: Vec<f64> = transcript
        .segments()
        .iter()
        .filter(|s| s.duration() > 0.0)
        .map(|s| per_minute(s.char_count(), s.duration()))
        .collect();

    let rhythm_variance = if speech_rate > 0.0 {
        population_std_dev(&local_rates) / speech_rate
    } else {
        0.0
    };

    let word_count = transcript
        .segments()
        .iter()
        .map(|s| s.text.split_whitespace().count())
        .sum();

    let avg_segment_chars = if segment_count > 0 {
        total_chars as f64 / segment_count as f64
    } else {
        0.0
    };

    let speech_coverage = if metadata.duration > 0.0 {
        covered / metadata.duration
    } else {
        0.0
    };

    PacingMetrics {
        speech_rate,
        rhythm_variance,
        rhythm: RhythmLabel::from_variance(rhythm_variance),
        content_density: per_minute(total_chars, metadata.duration),
        total_chars,
        word_count,
        segment_count,
        avg_segment_chars,
        speech_coverage,
    }
}

fn per_minute(chars: usize, seconds: f64) -> f64 {
    if seconds > 0.0 {
        chars as f64 / seconds * 60.0
    } else {
        0.0
    }
}

fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(duration: f64) -> VideoMetadata {
        VideoMetadata::new("vid", "Title", "Author", duration).unwrap()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_example_scenario_rate() {
        let t = Transcript::from_triples(
            [
                (0.0, 1.0, "Did you know this?"),
                (1.0, 3.0, "this simple trick saves time"),
                (3.0, 5.0, "let me show you how"),
            ],
            "en",
        )
        .unwrap();
        let p = analyze_pacing(&t, &meta(5.0));
        let chars = (18 + 28 + 19) as f64;
        assert_eq!(p.total_chars, 65);
        assert!(approx(p.speech_rate, chars / 5.0 * 60.0));
        assert!(approx(p.content_density, p.speech_rate));
        assert_eq!(p.segment_count, 3);
        assert_eq!(p.word_count, 14);
        assert!(approx(p.speech_coverage, 1.0));
        // Local rates 1080, 840 and 570 chars/min around 780.
        assert!((p.rhythm_variance - 0.2747).abs() < 1e-3);
        assert_eq!(p.rhythm, RhythmLabel::Medium);
    }

    #[test]
    fn test_empty_transcript() {
        let t = Transcript::empty("en");
        let p = analyze_pacing(&t, &meta(10.0));
        assert_eq!(p.speech_rate, 0.0);
        assert_eq!(p.rhythm_variance, 0.0);
        assert_eq!(p.rhythm, RhythmLabel::Low);
        assert_eq!(p.content_density, 0.0);
        assert_eq!(p.avg_segment_chars, 0.0);
    }

    #[test]
    fn test_rate_halves_when_duration_doubles() {
        let short = Transcript::from_triples([(0.0, 2.0, "abcdefghij")], "en").unwrap();
        let long = Transcript::from_triples([(0.0, 4.0, "abcdefghij")], "en").unwrap();
        let a = analyze_pacing(&short, &meta(4.0));
        let b = analyze_pacing(&long, &meta(4.0));
        assert!(approx(a.speech_rate, 2.0 * b.speech_rate));
    }

    #[test]
    fn test_density_uses_video_duration() {
        let t = Transcript::from_triples([(0.0, 5.0, "abcdefghij")], "en").unwrap();
        let p = analyze_pacing(&t, &meta(20.0));
        assert!(approx(p.speech_rate, 120.0));
        assert!(approx(p.content_density, 30.0));
        assert!(approx(p.speech_coverage, 0.25));
    }

    #[test]
    fn test_zero_length_video_density_is_zero() {
        let t = Transcript::from_triples([(0.0, 1.0, "abc")], "en").unwrap();
        let p = analyze_pacing(&t, &meta(0.0));
        assert_eq!(p.content_density, 0.0);
        assert_eq!(p.speech_coverage, 0.0);
    }

    #[test]
    fn test_uniform_pacing_is_low() {
        let t = Transcript::from_triples(
            [(0.0, 1.0, "abcd"), (1.0, 2.0, "efgh"), (2.0, 3.0, "ijkl")],
            "en",
        )
        .unwrap();
        let p = analyze_pacing(&t, &meta(3.0));
        assert!(approx(p.rhythm_variance, 0.0));
        assert_eq!(p.rhythm, RhythmLabel::Low);
    }

    #[test]
    fn test_erratic_pacing_is_high() {
        // Local rates 60 and 1200 cpm against an average of 630.
        let burst = "b".repeat(20);
        let t = Transcript::from_triples([(0.0, 1.0, "a"), (1.0, 2.0, burst.as_str())], "en")
            .unwrap();
        let p = analyze_pacing(&t, &meta(2.0));
        assert!(approx(p.speech_rate, 630.0));
        assert!(approx(p.rhythm_variance, 570.0 / 630.0));
        assert_eq!(p.rhythm, RhythmLabel::High);
    }

    #[test]
    fn test_chinese_counts_characters_not_bytes() {
        let t = Transcript::from_triples([(0.0, 6.0, "今天分享一个技巧")], "zh").unwrap();
        let p = analyze_pacing(&t, &meta(6.0));
        assert_eq!(p.total_chars, 8);
        assert!(approx(p.speech_rate, 80.0));
    }

    #[test]
    fn test_rhythm_bands() {
        assert_eq!(RhythmLabel::from_variance(0.0), RhythmLabel::Low);
        assert_eq!(RhythmLabel::from_variance(0.2499), RhythmLabel::Low);
        assert_eq!(RhythmLabel::from_variance(0.25), RhythmLabel::Medium);
        assert_eq!(RhythmLabel::from_variance(0.4999), RhythmLabel::Medium);
        assert_eq!(RhythmLabel::from_variance(0.5), RhythmLabel::High);
        assert_eq!(RhythmLabel::from_variance(3.0), RhythmLabel::High);
    }
}
