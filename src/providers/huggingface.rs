use anyhow::{bail, Context, Result};
use serde::Deserialize;

use super::{model_id, DownloadItem};

pub const DEFAULT_ENDPOINT: &str = "https://huggingface.co";
pub const DEFAULT_REVISION: &str = "main";

#[derive(Deserialize)]
struct ModelInfo {
    #[serde(default)]
    siblings: Vec<Sibling>,
}

#[derive(Deserialize)]
struct Sibling {
    rfilename: String,
    lfs: Option<LfsInfo>,
}

#[derive(Deserialize)]
struct LfsInfo {
    sha256: String,
}

/// Lists the files of a Hugging Face model through the hub API.
///
/// Only LFS files come with a SHA-256; small git-tracked files (configs,
/// tokenizers) are returned without one.
pub async fn fetch_huggingface_urls(endpoint: &str, model: &str, revision: &str) -> Result<Vec<DownloadItem>> {
    let endpoint = endpoint.trim_end_matches('/');
    let host = url::Url::parse(endpoint)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "huggingface.co".to_string());
    let model = model_id(model, &host, "")?;

    let api_url = format!("{endpoint}/api/models/{model}/revision/{revision}?blobs=true");
    let client = reqwest::Client::builder()
        .user_agent(concat!("partdl/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new());

    let resp = client
        .get(&api_url)
        .send()
        .await
        .context("Failed to request Hugging Face file list")?;
    if !resp.status().is_success() {
        bail!("Hugging Face API returned status {} for {}", resp.status(), model);
    }

    let body = resp.text().await.context("Failed to read Hugging Face response")?;
    let info: ModelInfo =
        serde_json::from_str(&body).context("Failed to parse Hugging Face model info")?;
    if info.siblings.is_empty() {
        bail!("Model {} has no files at revision {}", model, revision);
    }

    Ok(info
        .siblings
        .into_iter()
        .map(|file| DownloadItem {
            url: format!("{endpoint}/{model}/resolve/{revision}/{}", file.rfilename),
            hash: file.lfs.map(|lfs| lfs.sha256),
            path: Some(file.rfilename),
        })
        .collect())
}
