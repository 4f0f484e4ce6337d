use serde::{Deserialize, Serialize, Serializer};

use crate::error::{Error, Result};

/// Basic facts about a video, as reported by the acquisition step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub id: String,
    pub title: String,
    pub author: String,
    /// Video length in seconds.
    pub duration: f64,
    pub view_count: Option<u64>,
    #[serde(default)]
    pub like_count: Option<u64>,
    /// Upload date as the platform reports it (yt-dlp uses `YYYYMMDD`).
    #[serde(default)]
    pub upload_date: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
}

impl VideoMetadata {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        author: impl Into<String>,
        duration: f64,
    ) -> Result<Self> {
        let metadata = Self {
            id: id.into(),
            title: title.into(),
            author: author.into(),
            duration,
            view_count: None,
            like_count: None,
            upload_date: None,
            source_url: None,
        };
        metadata.validate()?;
        Ok(metadata)
    }

    pub fn view_count(mut self, count: u64) -> Self {
        self.view_count = Some(count);
        self
    }

    pub fn like_count(mut self, count: u64) -> Self {
        self.like_count = Some(count);
        self
    }

    pub fn upload_date(mut self, date: impl Into<String>) -> Self {
        self.upload_date = Some(date.into());
        self
    }

    pub fn source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.duration.is_finite() || self.duration < 0.0 {
            return Err(Error::InvalidOption(format!(
                "video duration must be a non-negative number, got {}",
                self.duration
            )));
        }
        Ok(())
    }
}

/// A timed piece of transcript text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl Segment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Length of the trimmed text in characters (not bytes).
    pub fn char_count(&self) -> usize {
        self.text.trim().chars().count()
    }
}

/// An ordered, non-overlapping sequence of segments.
///
/// Full text and duration are always computed from the segments, so they
/// cannot drift from them. Construction validates every segment; a
/// deserialized transcript goes through the same checks.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "TranscriptRepr")]
pub struct Transcript {
    segments: Vec<Segment>,
    language: String,
}

#[derive(Deserialize)]
struct TranscriptRepr {
    #[serde(default = "unknown_language")]
    language: String,
    segments: Vec<Segment>,
}

fn unknown_language() -> String {
    "unknown".into()
}

impl TryFrom<TranscriptRepr> for Transcript {
    type Error = Error;

    fn try_from(repr: TranscriptRepr) -> Result<Self> {
        Transcript::new(repr.segments, repr.language)
    }
}

#[derive(Serialize)]
struct TranscriptDoc<'a> {
    language: &'a str,
    duration: f64,
    text: String,
    segments: &'a [Segment],
}

impl Serialize for Transcript {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        TranscriptDoc {
            language: &self.language,
            duration: self.duration(),
            text: self.text(),
            segments: &self.segments,
        }
        .serialize(serializer)
    }
}

impl Transcript {
    /// Build a transcript from ordered segments.
    ///
    /// Fails with [`Error::UnsortedSegments`] if start times ever decrease, and
    /// with [`Error::InvalidSegment`] for a negative start, a non-positive
    /// duration, blank text, or an overlap with the previous segment.
    pub fn new(segments: Vec<Segment>, language: impl Into<String>) -> Result<Self> {
        for (i, pair) in segments.windows(2).enumerate() {
            if pair[1].start < pair[0].start {
                return Err(Error::UnsortedSegments { index: i + 1 });
            }
        }

        for (i, seg) in segments.iter().enumerate() {
            if !seg.start.is_finite() || seg.start < 0.0 {
                return Err(invalid(i, format!("start {} is not a non-negative time", seg.start)));
            }
            if !seg.end.is_finite() || seg.end <= seg.start {
                return Err(invalid(
                    i,
                    format!("end {} must be greater than start {}", seg.end, seg.start),
                ));
            }
            if seg.text.trim().is_empty() {
                return Err(invalid(i, "text is empty".into()));
            }
            if i > 0 && seg.start < segments[i - 1].end {
                return Err(invalid(
                    i,
                    format!(
                        "starts at {} before previous segment ends at {}",
                        seg.start,
                        segments[i - 1].end
                    ),
                ));
            }
        }

        Ok(Self {
            segments,
            language: language.into(),
        })
    }

    /// Build a transcript from raw `(start, end, text)` triples.
    pub fn from_triples<S: Into<String>>(
        triples: impl IntoIterator<Item = (f64, f64, S)>,
        language: impl Into<String>,
    ) -> Result<Self> {
        let segments = triples
            .into_iter()
            .map(|(start, end, text)| Segment::new(start, end, text))
            .collect();
        Self::new(segments, language)
    }

    pub fn empty(language: impl Into<String>) -> Self {
        Self {
            segments: Vec::new(),
            language: language.into(),
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Full text (all segments concatenated).
    pub fn text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.trim())
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string()
    }

    /// Covered duration: the latest segment end, or 0 for an empty transcript.
    pub fn duration(&self) -> f64 {
        self.segments.iter().map(|s| s.end).fold(0.0, f64::max)
    }

    /// Total characters across all segments, excluding joining spaces.
    pub fn char_count(&self) -> usize {
        self.segments.iter().map(Segment::char_count).sum()
    }

    /// Segments whose `[start, end)` window intersects `[t0, t1)`.
    pub fn segments_in(&self, t0: f64, t1: f64) -> Vec<&Segment> {
        self.segments
            .iter()
            .filter(|s| s.start < t1 && s.end > t0)
            .collect()
    }

    /// Format as SRT subtitles.
    pub fn to_srt(&self) -> String {
        let mut out = String::new();
        for (i, seg) in self.segments.iter().enumerate() {
            out.push_str(&format!("{}\n", i + 1));
            out.push_str(&format!(
                "{} --> {}\n",
                format_srt_time(seg.start),
                format_srt_time(seg.end)
            ));
            out.push_str(seg.text.trim());
            out.push_str("\n\n");
        }
        out
    }
}

fn invalid(index: usize, reason: String) -> Error {
    Error::InvalidSegment { index, reason }
}

/// Format seconds as SRT timestamp: HH:MM:SS,mmm
fn format_srt_time(seconds: f64) -> String {
    let total_ms = (seconds * 1000.0).round() as u64;
    let h = total_ms / 3_600_000;
    let m = (total_ms % 3_600_000) / 60_000;
    let s = (total_ms % 60_000) / 1_000;
    let ms = total_ms % 1_000;
    format!("{h:02}:{m:02}:{s:02},{ms:03}")
}
