//! Link discovery: turning a model id (or a tasks file) into file URLs.
//!
//! Nothing here is trusted by the transfer engine; a provider may return an
//! incomplete list and the engine just downloads what it is given.
pub mod huggingface;
pub mod modelscope;

use anyhow::{bail, Context, Result};
use std::path::Path;
use tokio::fs;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadItem {
    pub url: String,
    /// Expected hex SHA-256 of the file, when the source publishes one.
    pub hash: Option<String>,
    /// Location inside the repository (`onnx/model.onnx`), kept under the
    /// output directory. Without it the last URL segment is used.
    pub path: Option<String>,
}

/// Resolves the file URLs of `model` at `revision` from the named provider.
pub async fn fetch_urls(provider: &str, model: &str, revision: &str) -> Result<Vec<DownloadItem>> {
    match provider.to_lowercase().as_str() {
        "huggingface" | "hf" => {
            let endpoint = std::env::var("HF_ENDPOINT")
                .unwrap_or_else(|_| huggingface::DEFAULT_ENDPOINT.to_string());
            huggingface::fetch_huggingface_urls(&endpoint, model, revision).await
        }
        "modelscope" => {
            modelscope::fetch_modelscope_urls(modelscope::DEFAULT_ENDPOINT, model, revision).await
        }
        _ => bail!("Unsupported provider: {}", provider),
    }
}

/// Branch a provider's repositories use when none is given.
///
/// Unknown providers get `main`; `fetch_urls` rejects them anyway.
pub fn default_revision(provider: &str) -> &'static str {
    match provider.to_lowercase().as_str() {
        "modelscope" => modelscope::DEFAULT_REVISION,
        _ => huggingface::DEFAULT_REVISION,
    }
}

/// Reads a tasks file with one `url` or `url|sha256` per line.
///
/// Blank lines and lines starting with `#` are ignored.
pub async fn read_tasks_file(path: &Path) -> Result<Vec<DownloadItem>> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to open tasks file: {}", path.display()))?;
    Ok(parse_tasks(&content))
}

pub fn parse_tasks(content: &str) -> Vec<DownloadItem> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let mut parts = line.splitn(2, '|');
            let url = parts.next().unwrap_or_default().trim().to_string();
            let hash = parts
                .next()
                .map(|h| h.trim().to_lowercase())
                .filter(|h| !h.is_empty());
            (!url.is_empty()).then_some(DownloadItem { url, hash, path: None })
        })
        .collect()
}

/// Extracts `org/name` from either a bare id or a model page URL on `host`.
///
/// `https://huggingface.co/org/name/tree/main` and `org/name` both give
/// `org/name`. Page URLs may carry a path prefix such as `/models/`.
pub(crate) fn model_id(input: &str, host: &str, prefix: &str) -> Result<String> {
    let trimmed = input.trim().trim_end_matches('/');
    let path = match url::Url::parse(trimmed) {
        Ok(url) => {
            if url.host_str() != Some(host) {
                bail!("Expected a {} URL, got {}", host, input);
            }
            url.path().trim_start_matches('/').to_string()
        }
        Err(_) => trimmed.to_string(),
    };
    let path = path.strip_prefix(prefix).unwrap_or(&path);

    let mut segments = path.split('/').filter(|s| !s.is_empty());
    match (segments.next(), segments.next()) {
        (Some(org), Some(name)) => Ok(format!("{org}/{name}")),
        _ => bail!("Cannot determine model id from {}", input),
    }
}
