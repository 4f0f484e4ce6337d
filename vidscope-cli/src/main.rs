use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use vidscope::{
    AnalysisOptions, BatchReport, BatchResult, BatchRunner, FfmpegExtractor, Language, Model,
    TranscribeOptions, WhisperTranscriber, YtDlpAcquirer,
};

#[derive(Parser)]
#[command(
    name = "vidscope",
    about = "Analyze the structure of short-form videos: hook, pacing and content signals"
)]
struct Cli {
    /// Video URLs to analyze.
    #[arg(required_unless_present_any = ["file", "list_models", "download_model", "list_languages"])]
    urls: Vec<String>,

    /// Read URLs from a file, one per line (blank lines and # comments ignored).
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Directory for reports and the batch summary.
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Analyze only; do not write per-video reports.
    #[arg(long)]
    no_report: bool,

    /// Keep downloaded media under <output>/media.
    #[arg(long)]
    keep_media: bool,

    /// Whisper model name, or a path to a ggml file.
    #[arg(short, long, default_value = "base")]
    model: String,

    /// Language code (e.g. "en", "zh") or "auto" for detection.
    #[arg(short, long, default_value = "auto")]
    language: String,

    /// Length of the opening window inspected for a hook, in seconds.
    #[arg(long, default_value = "3.0")]
    hook_window: f64,

    /// Number of keywords to report.
    #[arg(long, default_value = "10")]
    top_keywords: usize,

    /// Give up on a video after this many seconds.
    #[arg(long)]
    timeout: Option<u64>,

    /// Disable GPU acceleration.
    #[arg(long)]
    no_gpu: bool,

    /// Number of whisper threads (default: auto).
    #[arg(long)]
    threads: Option<u32>,

    /// Beam search size (default: greedy).
    #[arg(long)]
    beam_size: Option<u32>,

    /// Model cache directory.
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// List available models.
    #[arg(long)]
    list_models: bool,

    /// Download a model without analyzing anything.
    #[arg(long)]
    download_model: Option<String>,

    /// List supported languages.
    #[arg(long)]
    list_languages: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vidscope=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    if cli.list_languages {
        println!("{:<6} LANGUAGE", "CODE");
        println!("{:<6} --------", "----");
        for (code, name) in Language::supported() {
            println!("{code:<6} {name}");
        }
        return;
    }

    if cli.list_models {
        list_models(cli.cache_dir.as_deref());
        return;
    }

    if let Some(name) = &cli.download_model {
        let Some(model) = Model::parse_name(name) else {
            eprintln!("Unknown model: {name}");
            exit_with("use --list-models to see available models");
        };
        let cache_dir = transcribe_cache_dir(cli.cache_dir.clone());
        match vidscope::model::ensure_model(&model, &cache_dir).await {
            Ok(path) => println!("Model ready: {}", path.display()),
            Err(e) => exit_with(e),
        }
        return;
    }

    let urls = collect_urls(&cli.urls, cli.file.as_deref()).unwrap_or_else(|e| exit_with(e));
    if urls.is_empty() {
        exit_with("no URLs to analyze");
    }

    let analysis = AnalysisOptions::new()
        .top_keywords(cli.top_keywords)
        .hook_window_seconds(cli.hook_window)
        .unwrap_or_else(|e| exit_with(e));
    let transcribe = transcribe_options(&cli).unwrap_or_else(|e| exit_with(e));

    let mut acquirer = YtDlpAcquirer::new().keep_media(cli.keep_media);
    if cli.keep_media {
        let media_dir = cli.output.join("media");
        if let Err(e) = std::fs::create_dir_all(&media_dir) {
            exit_with(format!("cannot create {}: {e}", media_dir.display()));
        }
        acquirer = acquirer.work_dir(media_dir);
    }

    let mut runner = BatchRunner::new(acquirer, FfmpegExtractor::new(), WhisperTranscriber::new())
        .analysis(analysis)
        .unwrap_or_else(|e| exit_with(e))
        .transcribe(transcribe);
    if !cli.no_report {
        runner = runner.output_dir(cli.output.join("reports"));
    }
    if let Some(secs) = cli.timeout {
        runner = runner
            .item_timeout(Duration::from_secs(secs))
            .unwrap_or_else(|e| exit_with(e));
    }

    let progress = ProgressBar::new(urls.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("[{pos}/{len}] {wide_bar:.cyan/blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let mut results = Vec::with_capacity(urls.len());
    for url in &urls {
        progress.set_message(url.clone());
        let result = runner.process(url).await;
        progress.println(describe(&result));
        results.push(result);
        progress.inc(1);
    }
    progress.finish_and_clear();

    let report = BatchReport::from_iter(results);
    eprintln!("\nBatch finished: {}", report.summary());

    if let Err(e) = write_summary(&report, &cli.output) {
        eprintln!("Error writing batch summary: {e}");
    }

    if report.all_failed() {
        std::process::exit(1);
    }
}

fn exit_with(message: impl Display) -> ! {
    eprintln!("Error: {message}");
    std::process::exit(1);
}

/// URLs from the command line followed by those in `file`, in order.
fn collect_urls(args: &[String], file: Option<&Path>) -> std::io::Result<Vec<String>> {
    let mut urls: Vec<String> = args.iter().map(|u| u.trim().to_string()).collect();
    if let Some(path) = file {
        let content = std::fs::read_to_string(path)?;
        urls.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_string),
        );
    }
    Ok(urls)
}

fn transcribe_options(cli: &Cli) -> vidscope::Result<TranscribeOptions> {
    let model = match Model::parse_name(&cli.model) {
        Some(m) => m,
        None => {
            let path = PathBuf::from(&cli.model);
            if !path.exists() {
                return Err(vidscope::Error::InvalidOption(format!(
                    "unknown model {:?}; use --list-models, or pass a path to a ggml file",
                    cli.model
                )));
            }
            Model::Custom(path)
        }
    };

    let mut opts = TranscribeOptions::new()
        .model(model)
        .language(&cli.language)?
        .gpu(!cli.no_gpu);
    if let Some(n) = cli.threads {
        opts = opts.n_threads(n)?;
    }
    if let Some(size) = cli.beam_size {
        opts = opts.beam_size(size)?;
    }
    if let Some(dir) = &cli.cache_dir {
        opts = opts.cache_dir(dir.clone());
    }
    Ok(opts)
}

fn transcribe_cache_dir(cache_dir: Option<PathBuf>) -> PathBuf {
    cache_dir.unwrap_or_else(|| TranscribeOptions::default().resolve_cache_dir())
}

fn list_models(cache_dir: Option<&Path>) {
    let cache_dir = transcribe_cache_dir(cache_dir.map(Path::to_path_buf));

    println!("{:<16} {:<10} CACHED", "MODEL", "SIZE");
    println!("{:<16} {:<10} ------", "-----", "----");
    for model in Model::all() {
        let cached = if vidscope::model::is_cached(&model, &cache_dir) {
            "yes"
        } else {
            ""
        };
        println!("{:<16} {:<10} {cached}", model.name(), model.approx_size());
    }

    let cached = vidscope::model::list_cached_models(&cache_dir);
    if !cached.is_empty() {
        println!("\nCached models in {}:", cache_dir.display());
        for path in cached {
            let size = std::fs::metadata(&path)
                .map(|m| format_bytes(m.len()))
                .unwrap_or_default();
            println!(
                "  {} ({size})",
                path.file_name()
                    .map(|f| f.to_string_lossy().into_owned())
                    .unwrap_or_default()
            );
        }
    }
}

/// One line per processed video.
fn describe(result: &BatchResult) -> String {
    match result {
        BatchResult::Success {
            identifier,
            record,
            reports,
        } => {
            let mut line = format!(
                "ok    {identifier}: {} | {:.0} chars/min ({}) | quality {:.2}",
                record.hook().category,
                record.pacing().speech_rate,
                record.pacing().rhythm,
                record.signals().quality_score
            );
            if let Some(paths) = reports {
                line.push_str(&format!(" -> {}", paths.markdown.display()));
            }
            line
        }
        BatchResult::Failure {
            identifier,
            kind,
            message,
        } => format!("FAIL  {identifier}: [{kind}] {message}"),
    }
}

fn write_summary(report: &BatchReport, output: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(output)?;
    let path = output.join("batch_summary.json");
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, json)?;
    eprintln!("Summary written to {}", path.display());
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes >= 1_000_000_000 {
        format!("{:.1} GB", bytes as f64 / 1_000_000_000.0)
    } else if bytes >= 1_000_000 {
        format!("{:.0} MB", bytes as f64 / 1_000_000.0)
    } else {
        format!("{:.0} KB", bytes as f64 / 1_000.0)
    }
}
