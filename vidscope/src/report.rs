//! Record assembly and rendering.
//!
//! An [`AnalysisRecord`] is the single source of truth for one video. The JSON
//! and Markdown documents are pure functions of it, so rendering the same record
//! twice gives byte-identical output.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::AnalysisOptions;
use crate::error::{Error, Result};
use crate::hook::{classify_hook, HookCategory, HookResult};
use crate::pacing::{analyze_pacing, PacingMetrics};
use crate::signals::{extract_signals, ContentSignals};
use crate::types::{Transcript, VideoMetadata};

/// Version of the structured document layout.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete analysis of one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    schema_version: u32,
    metadata: VideoMetadata,
    transcript: Transcript,
    hook: HookResult,
    pacing: PacingMetrics,
    signals: ContentSignals,
    generated_at: DateTime<Utc>,
}

impl AnalysisRecord {
    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn hook(&self) -> &HookResult {
        &self.hook
    }

    pub fn pacing(&self) -> &PacingMetrics {
        &self.pacing
    }

    pub fn signals(&self) -> &ContentSignals {
        &self.signals
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    /// Parse a structured document produced by [`render`].
    pub fn from_json(json: &str) -> Result<Self> {
        let record: AnalysisRecord = serde_json::from_str(json)?;
        if record.schema_version != SCHEMA_VERSION {
            return Err(Error::InvalidOption(format!(
                "unsupported schema version {} (expected {SCHEMA_VERSION})",
                record.schema_version
            )));
        }
        record.metadata.validate()?;
        Ok(record)
    }
}

/// Collects analyzer outputs and assembles them into a record.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    metadata: VideoMetadata,
    transcript: Option<Transcript>,
    hook: Option<HookResult>,
    pacing: Option<PacingMetrics>,
    signals: Option<ContentSignals>,
    generated_at: Option<DateTime<Utc>>,
}

impl RecordBuilder {
    pub fn new(metadata: VideoMetadata) -> Self {
        Self {
            metadata,
            transcript: None,
            hook: None,
            pacing: None,
            signals: None,
            generated_at: None,
        }
    }

    pub fn transcript(mut self, transcript: Transcript) -> Self {
        self.transcript = Some(transcript);
        self
    }

    pub fn hook(mut self, hook: HookResult) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn pacing(mut self, pacing: PacingMetrics) -> Self {
        self.pacing = Some(pacing);
        self
    }

    pub fn signals(mut self, signals: ContentSignals) -> Self {
        self.signals = Some(signals);
        self
    }

    /// Stamp the record. Defaults to the time of [`build`](Self::build).
    pub fn generated_at(mut self, at: DateTime<Utc>) -> Self {
        self.generated_at = Some(at);
        self
    }

    pub fn build(self) -> Result<AnalysisRecord> {
        let missing = |missing| Error::IncompleteAnalysis { missing };
        Ok(AnalysisRecord {
            schema_version: SCHEMA_VERSION,
            transcript: self.transcript.ok_or_else(|| missing("transcript"))?,
            hook: self.hook.ok_or_else(|| missing("hook"))?,
            pacing: self.pacing.ok_or_else(|| missing("pacing"))?,
            signals: self.signals.ok_or_else(|| missing("signals"))?,
            metadata: self.metadata,
            generated_at: self.generated_at.unwrap_or_else(Utc::now),
        })
    }
}

/// Run every analyzer over `transcript` and assemble the record, stamped now.
pub fn analyze(
    metadata: VideoMetadata,
    transcript: Transcript,
    options: &AnalysisOptions,
) -> Result<AnalysisRecord> {
    analyze_at(metadata, transcript, options, Utc::now())
}

/// Like [`analyze`] with an explicit timestamp; the result depends only on
/// the arguments.
pub fn analyze_at(
    metadata: VideoMetadata,
    transcript: Transcript,
    options: &AnalysisOptions,
    generated_at: DateTime<Utc>,
) -> Result<AnalysisRecord> {
    options.validate()?;
    metadata.validate()?;

    let hook = classify_hook(&transcript, options.hook_window_seconds);
    let pacing = analyze_pacing(&transcript, &metadata);
    let signals = extract_signals(&transcript, &hook, &pacing, options);

    info!(
        id = %metadata.id,
        hook = %hook.category,
        speech_rate = pacing.speech_rate,
        quality = signals.quality_score,
        "analysis complete"
    );

    RecordBuilder::new(metadata)
        .transcript(transcript)
        .hook(hook)
        .pacing(pacing)
        .signals(signals)
        .generated_at(generated_at)
        .build()
}

/// The two output documents for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedReport {
    pub json: String,
    pub markdown: String,
}

pub fn render(record: &AnalysisRecord) -> Result<RenderedReport> {
    Ok(RenderedReport {
        json: serde_json::to_string_pretty(record)?,
        markdown: render_markdown(record),
    })
}

/// Where [`write_report`] put the documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPaths {
    pub json: PathBuf,
    pub markdown: PathBuf,
    pub subtitles: PathBuf,
}

/// Render and write `<id>_data.json`, `<id>_report.md` and the transcript as
/// `<id>_subtitles.srt` into `dir`, creating it if needed.
pub fn write_report(record: &AnalysisRecord, dir: &Path) -> Result<ReportPaths> {
    let rendered = render(record)?;
    std::fs::create_dir_all(dir)?;

    let stem = file_stem(&record.metadata.id);
    let paths = ReportPaths {
        json: dir.join(format!("{stem}_data.json")),
        markdown: dir.join(format!("{stem}_report.md")),
        subtitles: dir.join(format!("{stem}_subtitles.srt")),
    };
    std::fs::write(&paths.json, rendered.json)?;
    std::fs::write(&paths.markdown, rendered.markdown)?;
    std::fs::write(&paths.subtitles, record.transcript.to_srt())?;

    debug!(json = %paths.json.display(), markdown = %paths.markdown.display(), "report written");
    Ok(paths)
}

/// Reduce an identifier to characters safe in a file name.
fn file_stem(id: &str) -> String {
    let stem: String = id
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = stem.trim_matches('.');
    if stem.is_empty() {
        "video".into()
    } else {
        stem.to_string()
    }
}

fn render_markdown(record: &AnalysisRecord) -> String {
    let meta = &record.metadata;
    let transcript = &record.transcript;
    let hook = &record.hook;
    let pacing = &record.pacing;
    let signals = &record.signals;

    let mut out = String::new();
    out.push_str(&format!("# Video Analysis: {}\n\n", inline(&meta.title)));

    out.push_str("## Basic Info\n\n");
    out.push_str("| Field | Value |\n|-------|-------|\n");
    for (field, value) in [
        ("Title", cell(&meta.title)),
        ("Author", cell(&meta.author)),
        ("Duration", format_duration(meta.duration)),
        ("Views", optional(meta.view_count.map(format_count))),
        ("Likes", optional(meta.like_count.map(format_count))),
        ("Upload date", optional(meta.upload_date.as_deref().map(cell))),
        ("Language", cell(transcript.language())),
        ("Segments", transcript.segment_count().to_string()),
        ("Source", optional(meta.source_url.as_deref().map(cell))),
    ] {
        out.push_str(&format!("| **{field}** | {value} |\n"));
    }
    out.push('\n');

    out.push_str(&format!(
        "## Hook Analysis (opening {:.1}s)\n\n",
        hook.window_seconds
    ));
    out.push_str(&format!("**Category**: {}\n\n", hook.category));
    if hook.category == HookCategory::NoneDetected {
        out.push_str("_No speech in the opening window._\n\n");
    } else {
        out.push_str(&format!("**Text**: {}\n\n", inline(&hook.text)));
        out.push_str(&format!(
            "**Span**: `{} - {}` ({:.1}s)\n\n",
            format_timestamp(hook.start),
            format_timestamp(hook.start + hook.duration),
            hook.duration
        ));
    }
    out.push_str(&format!(
        "**Rule**: {}\n\n",
        hook.rule.as_deref().unwrap_or("none")
    ));
    out.push_str(&format!("**Rationale**: {}\n\n", hook.rationale));

    out.push_str("## Full Transcript\n\n");
    if transcript.is_empty() {
        out.push_str("_No speech detected._\n\n");
    } else {
        out.push_str(&paragraph(&transcript.text()));
        out.push_str("\n\n");
    }

    out.push_str("## Segments\n\n");
    if transcript.is_empty() {
        out.push_str("_No segments._\n\n");
    }
    for (i, seg) in transcript.segments().iter().enumerate() {
        out.push_str(&format!(
            "**{}.** `{} - {}` {}\n\n",
            i + 1,
            format_timestamp(seg.start),
            format_timestamp(seg.end),
            inline(&seg.text)
        ));
    }

    out.push_str("## Structural Metrics\n\n");
    out.push_str("### Pacing\n\n");
    out.push_str(&format!(
        "- **Speech rate**: {:.1} chars/min\n",
        pacing.speech_rate
    ));
    out.push_str(&format!(
        "- **Content density**: {:.1} chars/min of video\n",
        pacing.content_density
    ));
    out.push_str(&format!(
        "- **Rhythm**: {} ({}, variation {:.3})\n",
        pacing.rhythm,
        pacing.rhythm.describe(),
        pacing.rhythm_variance
    ));
    out.push_str(&format!("- **Characters**: {}\n", pacing.total_chars));
    out.push_str(&format!("- **Words**: {}\n", pacing.word_count));
    out.push_str(&format!(
        "- **Average segment length**: {:.1} chars\n",
        pacing.avg_segment_chars
    ));
    out.push_str(&format!(
        "- **Speech coverage**: {:.1}%\n\n",
        pacing.speech_coverage * 100.0
    ));

    out.push_str("### Content Signals\n\n");
    out.push_str(&format!(
        "- **Sentiment**: {} (score {:+})\n",
        signals.sentiment, signals.sentiment_score
    ));
    let keywords = if signals.keywords.is_empty() {
        "none".to_string()
    } else {
        signals
            .keywords
            .iter()
            .map(|k| format!("{} ({})", inline(&k.term), k.count))
            .collect::<Vec<_>>()
            .join(", ")
    };
    out.push_str(&format!("- **Keywords**: {keywords}\n"));
    out.push_str(&format!(
        "- **Keyword density**: {:.1}%\n",
        signals.keyword_density * 100.0
    ));
    out.push_str(&format!(
        "- **Quality score**: {:.2} / 10\n\n",
        signals.quality_score
    ));

    out.push_str("---\n\n");
    out.push_str(&format!(
        "*Generated at {}*\n",
        record.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out
}

/// Collapse newlines so text stays on one Markdown line.
fn inline(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A free-standing paragraph: a leading block marker is escaped so speech
/// like "# 1 tip" stays body text.
fn paragraph(text: &str) -> String {
    let text = inline(text);
    match text.chars().next() {
        Some('#' | '>' | '-' | '+' | '*' | '=' | '|') => format!("\\{text}"),
        _ => text,
    }
}

/// Escape pipes so text stays inside its table cell.
fn cell(text: &str) -> String {
    inline(text).replace('|', "\\|")
}

fn optional(value: Option<String>) -> String {
    value.unwrap_or_else(|| "N/A".into())
}

/// Human-readable duration: `42.5s`, `3m 07s` or `1h 02m`.
pub fn format_duration(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{seconds:.1}s")
    } else if seconds < 3600.0 {
        let total = seconds as u64;
        format!("{}m {:02}s", total / 60, total % 60)
    } else {
        let total = seconds as u64;
        format!("{}h {:02}m", total / 3600, (total % 3600) / 60)
    }
}

/// Format seconds as an MM:SS timestamp.
pub fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Abbreviate large counts: `950`, `12.3K`, `4.2M`.
pub fn format_count(n: u64) -> String {
    match n {
        n if n >= 1_000_000 => format!("{:.1}M", n as f64 / 1_000_000.0),
        n if n >= 1_000 => format!("{:.1}K", n as f64 / 1_000.0),
        n => n.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pacing::RhythmLabel;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap()
    }

    fn example_record() -> AnalysisRecord {
        let metadata = VideoMetadata::new("abc123", "Save | Time", "Jo", 5.0)
            .unwrap()
            .view_count(12_345)
            .upload_date("20240501");
        let transcript = Transcript::from_triples(
            [
                (0.0, 1.0, "Did you know this?"),
                (1.0, 3.0, "this simple trick saves time"),
                (3.0, 5.0, "let me show you how"),
            ],
            "en",
        )
        .unwrap();
        analyze_at(metadata, transcript, &AnalysisOptions::default(), fixed_time()).unwrap()
    }

    #[test]
    fn test_example_record() {
        let record = example_record();
        assert_eq!(record.hook().category, HookCategory::Question);
        assert_eq!(record.hook().duration, 3.0);
        assert!((record.pacing().speech_rate - 780.0).abs() < 1e-9);
        assert_eq!(record.generated_at(), fixed_time());
        assert_eq!(record.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn test_render_is_deterministic() {
        let record = example_record();
        assert_eq!(render(&record).unwrap(), render(&record).unwrap());
        assert_eq!(render(&record).unwrap(), render(&example_record()).unwrap());
    }

    #[test]
    fn test_markdown_sections() {
        let md = render(&example_record()).unwrap().markdown;
        let order = [
            "## Basic Info",
            "## Hook Analysis (opening 3.0s)",
            "## Full Transcript",
            "## Segments",
            "## Structural Metrics",
            "*Generated at 2024-05-01 12:30:00 UTC*",
        ];
        let mut last = 0;
        for heading in order {
            let pos = md.find(heading).unwrap_or_else(|| panic!("missing {heading}"));
            assert!(pos >= last, "{heading} out of order");
            last = pos;
        }
        assert!(md.contains("| **Title** | Save \\| Time |"));
        assert!(md.contains("| **Views** | 12.3K |"));
        assert!(md.contains("| **Likes** | N/A |"));
        assert!(md.contains("**Category**: question-hook"));
        assert!(md.contains("**1.** `00:00 - 00:01` Did you know this?"));
        assert!(md.contains("- **Speech rate**: 780.0 chars/min"));
    }

    #[test]
    fn test_json_round_trip_reproduces_markdown() {
        let record = example_record();
        let rendered = render(&record).unwrap();
        let parsed = AnalysisRecord::from_json(&rendered.json).unwrap();
        assert_eq!(parsed, record);
        assert_eq!(render(&parsed).unwrap().markdown, rendered.markdown);
    }

    #[test]
    fn test_json_carries_derived_transcript_fields() {
        let json = render(&example_record()).unwrap().json;
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["schema_version"], 1);
        assert_eq!(value["transcript"]["duration"], 5.0);
        assert_eq!(value["hook"]["category"], "question-hook");
        assert_eq!(value["pacing"]["rhythm"], "medium");
    }

    #[test]
    fn test_speech_cannot_break_document_structure() {
        let metadata = VideoMetadata::new("md", "Markdown", "Jo", 4.0).unwrap();
        let transcript = Transcript::from_triples(
            [(0.0, 2.0, "# 1 tip\n## for you"), (2.0, 4.0, "read\n\nthis")],
            "en",
        )
        .unwrap();
        let record =
            analyze_at(metadata, transcript, &AnalysisOptions::default(), fixed_time()).unwrap();
        let md = render(&record).unwrap().markdown;

        assert!(md.contains("\\# 1 tip ## for you read this\n"));
        assert!(md.contains("`00:02 - 00:04` read this\n"));
        let headings: Vec<_> = md.lines().filter(|l| l.starts_with('#')).collect();
        assert!(headings.iter().all(|h| !h.contains("tip")), "{headings:?}");
    }

    #[test]
    fn test_from_json_rejects_other_schema_version() {
        let json = render(&example_record()).unwrap().json;
        let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
        value["schema_version"] = 2.into();
        let err = AnalysisRecord::from_json(&value.to_string()).unwrap_err();
        assert!(matches!(err, Error::InvalidOption(_)));
    }

    #[test]
    fn test_empty_transcript_still_builds() {
        let metadata = VideoMetadata::new("silent", "Silent", "Nobody", 10.0).unwrap();
        let record = analyze_at(
            metadata,
            Transcript::empty("unknown"),
            &AnalysisOptions::default(),
            fixed_time(),
        )
        .unwrap();
        assert_eq!(record.pacing().speech_rate, 0.0);
        assert_eq!(record.pacing().rhythm, RhythmLabel::Low);
        assert_eq!(record.hook().category, HookCategory::NoneDetected);

        let md = render(&record).unwrap().markdown;
        assert!(md.contains("_No speech in the opening window._"));
        assert!(md.contains("_No segments._"));
        assert!(md.contains("- **Keywords**: none"));
    }

    #[test]
    fn test_invalid_options_rejected() {
        let metadata = VideoMetadata::new("v", "t", "a", 1.0).unwrap();
        let options = AnalysisOptions {
            hook_window_seconds: -1.0,
            ..AnalysisOptions::default()
        };
        let err = analyze(metadata, Transcript::empty("en"), &options).unwrap_err();
        assert!(matches!(err, Error::InvalidOption(_)));
    }

    #[test]
    fn test_builder_reports_missing_part() {
        let record = example_record();
        let err = RecordBuilder::new(record.metadata().clone())
            .transcript(record.transcript().clone())
            .hook(record.hook().clone())
            .signals(record.signals().clone())
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::IncompleteAnalysis { missing: "pacing" }));

        let err = RecordBuilder::new(record.metadata().clone())
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::IncompleteAnalysis { missing: "transcript" }));
    }

    #[test]
    fn test_write_report() {
        let dir = std::env::temp_dir().join("vidscope_test_write_report");
        let _ = std::fs::remove_dir_all(&dir);

        let record = example_record();
        let paths = write_report(&record, &dir).unwrap();
        assert_eq!(paths.json, dir.join("abc123_data.json"));
        assert_eq!(paths.markdown, dir.join("abc123_report.md"));

        let json = std::fs::read_to_string(&paths.json).unwrap();
        assert_eq!(AnalysisRecord::from_json(&json).unwrap(), record);
        let md = std::fs::read_to_string(&paths.markdown).unwrap();
        assert_eq!(md, render(&record).unwrap().markdown);
        assert_eq!(paths.subtitles, dir.join("abc123_subtitles.srt"));
        let srt = std::fs::read_to_string(&paths.subtitles).unwrap();
        assert!(srt.starts_with("1\n00:00:00,000 --> 00:00:01,000\nDid you know this?\n\n"));
        assert!(srt.contains("3\n00:00:03,000 --> 00:00:05,000\nlet me show you how\n"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("abc-123_x"), "abc-123_x");
        assert_eq!(file_stem("a/b:c"), "a_b_c");
        assert_eq!(file_stem(".."), "video");
    }

    #[test]
    fn test_formatting_helpers() {
        assert_eq!(format_duration(42.5), "42.5s");
        assert_eq!(format_duration(187.0), "3m 07s");
        assert_eq!(format_duration(3720.0), "1h 02m");
        assert_eq!(format_timestamp(0.0), "00:00");
        assert_eq!(format_timestamp(75.9), "01:15");
        assert_eq!(format_count(950), "950");
        assert_eq!(format_count(12_345), "12.3K");
        assert_eq!(format_count(4_200_000), "4.2M");
    }
}
