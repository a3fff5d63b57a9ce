use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Hex SHA-256 digest of the file at `filepath`.
pub async fn calculate_hash(filepath: &Path) -> Result<String> {
    let mut file = File::open(filepath)
        .await
        .with_context(|| format!("Failed to open {} for hashing", filepath.display()))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 64 * 1024];

    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}
