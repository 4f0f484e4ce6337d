use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::config::Model;
use crate::error::{Error, Result};

const HUGGINGFACE_BASE: &str =
    "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";

/// Smallest plausible ggml file; anything less is an HTML error page.
const MIN_MODEL_BYTES: u64 = 1_000_000;

/// Where `model` lives once cached, or its own path for a custom model.
pub fn model_path(model: &Model, cache_dir: &Path) -> PathBuf {
    match model {
        Model::Custom(path) => path.clone(),
        _ => cache_dir.join(model.filename()),
    }
}

/// True when `model` can be loaded without a download.
pub fn is_cached(model: &Model, cache_dir: &Path) -> bool {
    model_path(model, cache_dir).exists()
}

/// Make sure the ggml file for `model` is on disk, downloading it from
/// HuggingFace into `cache_dir` on first use.
pub async fn ensure_model(model: &Model, cache_dir: &Path) -> Result<PathBuf> {
    match model {
        Model::Custom(path) => {
            if path.exists() {
                Ok(path.clone())
            } else {
                Err(Error::ModelNotFound { path: path.clone() })
            }
        }
        _ => {
            let dest = model_path(model, cache_dir);
            if dest.exists() {
                debug!(path = %dest.display(), "model already cached");
                return Ok(dest);
            }

            std::fs::create_dir_all(cache_dir).map_err(|e| {
                Error::Model(format!("failed to create cache dir {}: {e}", cache_dir.display()))
            })?;

            let url = format!("{HUGGINGFACE_BASE}/{}", model.filename());
            info!(%url, "downloading model");
            download_model(&url, &dest).await?;

            Ok(dest)
        }
    }
}

async fn download_model(url: &str, dest: &Path) -> Result<()> {
    let response = reqwest::get(url)
        .await?
        .error_for_status()
        .map_err(|e| Error::ModelDownload(format!("{url}: {e}")))?;
    let expected = response.content_length();

    let progress = ProgressBar::new(expected.unwrap_or(0));
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            .map_err(|e| Error::ModelDownload(format!("progress template: {e}")))?
            .progress_chars("=> "),
    );
    progress.set_message(format!(
        "model {}",
        dest.file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default()
    ));

    // Partial downloads never carry the final name.
    let part = dest.with_extension("bin.part");
    let written = match stream_to_file(response, &part, &progress).await {
        Ok(n) => n,
        Err(e) => {
            progress.abandon();
            std::fs::remove_file(&part).ok();
            return Err(e);
        }
    };

    if written < MIN_MODEL_BYTES {
        std::fs::remove_file(&part).ok();
        return Err(Error::ModelDownload(format!(
            "downloaded only {written} bytes, probably an error page"
        )));
    }
    if let Some(expected) = expected.filter(|&n| n != written) {
        warn!(expected, written, "model size differs from Content-Length");
    }

    std::fs::rename(&part, dest)?;
    progress.finish_and_clear();
    info!(path = %dest.display(), bytes = written, "model saved");
    Ok(())
}

async fn stream_to_file(
    response: reqwest::Response,
    path: &Path,
    progress: &ProgressBar,
) -> Result<u64> {
    use std::io::Write;

    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    let mut stream = response.bytes_stream();
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)?;
        written += chunk.len() as u64;
        progress.set_position(written);
    }
    file.flush()?;
    Ok(written)
}

/// Cached ggml files in `cache_dir`, sorted by name.
pub fn list_cached_models(cache_dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(cache_dir) else {
        return Vec::new();
    };

    let mut models: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "bin"))
        .collect();
    models.sort();
    models
}
