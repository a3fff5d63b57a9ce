use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

use super::{model_id, DownloadItem};

pub const DEFAULT_ENDPOINT: &str = "https://modelscope.cn";
pub const DEFAULT_REVISION: &str = "master";

#[derive(Deserialize)]
struct ModelScopeResponse {
    #[serde(rename = "Data")]
    data: Option<ModelScopeData>,
    #[serde(rename = "Message")]
    message: Option<String>,
}

#[derive(Deserialize)]
struct ModelScopeData {
    #[serde(rename = "Files")]
    files: Vec<ModelScopeFile>,
}

#[derive(Deserialize)]
struct ModelScopeFile {
    #[serde(rename = "Path")]
    path: String,
    #[serde(rename = "Type", default)]
    kind: Option<String>,
    #[serde(rename = "Sha256", default)]
    sha256: Option<String>,
}

pub async fn fetch_modelscope_urls(endpoint: &str, model: &str, revision: &str) -> Result<Vec<DownloadItem>> {
    let endpoint = endpoint.trim_end_matches('/');
    let model = model_id(model, "modelscope.cn", "models/")?;
    let api_url = format!("{endpoint}/api/v1/models/{model}/repo/files?Revision={revision}&Recursive=true");
    let client = reqwest::Client::builder()
        .user_agent(concat!("partdl/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new());

    let resp = client
        .get(&api_url)
        .send()
        .await
        .context("Failed to request ModelScope file list")?;
    if !resp.status().is_success() {
        bail!("ModelScope API returned status {} for {}", resp.status(), model);
    }

    let body = resp.text().await.context("Failed to read ModelScope response")?;
    let parsed: ModelScopeResponse =
        serde_json::from_str(&body).context("Failed to parse ModelScope response JSON")?;

    let data = parsed.data.ok_or_else(|| {
        anyhow!(
            "ModelScope response has no Data field: {}",
            parsed.message.unwrap_or_default()
        )
    })?;

    let items: Vec<DownloadItem> = data
        .files
        .into_iter()
        .filter(|f| f.kind.as_deref() != Some("tree"))
        .map(|file| DownloadItem {
            url: format!("{endpoint}/models/{model}/resolve/{revision}/{}", file.path),
            hash: file.sha256.filter(|h| !h.is_empty()),
            path: Some(file.path),
        })
        .collect();

    if items.is_empty() {
        bail!("Model {} has no files at revision {}", model, revision);
    }
    Ok(items)
}
