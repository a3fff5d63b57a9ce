use reqwest::header::CONTENT_LENGTH;
use reqwest::Client;
use tracing::debug;

use crate::error::TransferError;

/// Looks up the total size of a remote resource with a HEAD request.
///
/// The `Content-Length` header is read directly: for HEAD responses the body
/// is empty, so the size hint reqwest exposes cannot be trusted.
pub async fn probe(client: &Client, url: &str) -> Result<u64, TransferError> {
    let unknown = |reason: String| TransferError::SizeUnknown {
        url: url.to_string(),
        reason,
    };

    let response = client
        .head(url)
        .send()
        .await
        .map_err(|e| unknown(format!("request failed: {e}")))?;

    if !response.status().is_success() {
        return Err(unknown(format!("status {}", response.status())));
    }

    let size = response
        .headers()
        .get(CONTENT_LENGTH)
        .ok_or_else(|| unknown("Content-Length header missing".into()))?
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .ok_or_else(|| unknown("Content-Length header is not a number".into()))?;

    if size == 0 {
        return Err(unknown("Content-Length is zero".into()));
    }

    debug!(url, size, "probed resource size");
    Ok(size)
}
