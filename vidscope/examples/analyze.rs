//! Analyze a transcript stored as JSON and print the Markdown report.
//!
//! Usage: cargo run --example analyze -- transcript.json [duration-secs]
//!
//! The JSON holds `{"language": "en", "segments": [{"start", "end", "text"}]}`.

use vidscope::{analyze, render, AnalysisOptions, Transcript, VideoMetadata};

fn main() -> vidscope::Result<()> {
    let mut args = std::env::args().skip(1);
    let path = args
        .next()
        .expect("usage: analyze <transcript.json> [duration-secs]");

    let transcript: Transcript = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    let duration = match args.next() {
        Some(secs) => secs
            .parse()
            .map_err(|e| vidscope::Error::InvalidOption(format!("duration: {e}")))?,
        None => transcript.duration(),
    };

    let metadata = VideoMetadata::new("local", path.as_str(), "unknown", duration)?;
    let record = analyze(metadata, transcript, &AnalysisOptions::default())?;

    print!("{}", render(&record)?.markdown);
    Ok(())
}
