//! Analyze a few videos end to end and print one line per result.
//!
//! Usage: cargo run --example batch -- URL [URL ...]

use std::time::Duration;

use vidscope::{
    BatchResult, BatchRunner, FfmpegExtractor, Model, TranscribeOptions, WhisperTranscriber,
    YtDlpAcquirer,
};

#[tokio::main]
async fn main() -> vidscope::Result<()> {
    let urls: Vec<String> = std::env::args().skip(1).collect();

    let runner = BatchRunner::new(
        YtDlpAcquirer::new(),
        FfmpegExtractor::new(),
        WhisperTranscriber::new(),
    )
    .transcribe(TranscribeOptions::new().model(Model::Tiny))
    .item_timeout(Duration::from_secs(300))?
    .output_dir("output");

    let report = runner.run(&urls).await;
    for result in report.results() {
        match result {
            BatchResult::Success { identifier, record, .. } => println!(
                "{identifier}: {} (quality {:.2})",
                record.hook().category,
                record.signals().quality_score
            ),
            BatchResult::Failure { identifier, kind, message, .. } => {
                println!("{identifier}: {kind}: {message}")
            }
        }
    }
    println!("{}", report.summary());
    Ok(())
}
