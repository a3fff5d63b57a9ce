use anyhow::{Context, Result};
use indicatif::MultiProgress;
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

use crate::cli::VerifyMode;
use crate::config::TransferConfig;
use crate::coordinator::TransferCoordinator;
use crate::hashing;
use crate::plan;
use crate::probe;
use crate::providers::DownloadItem;
use crate::state::{TransferJob, TransferOutcome};
use crate::utils::{get_filename_from_url, sanitize_filename, sanitize_relative_path};

/// Turns download items into finished files under one output directory.
pub struct Downloader {
    client: Client,
    output_dir: PathBuf,
    parts: u64,
    coordinator: TransferCoordinator,
    verify_mode: VerifyMode,
    overwrite: bool,
}

impl Downloader {
    pub fn new(output_dir: PathBuf, config: TransferConfig, verify_mode: VerifyMode) -> Result<Self> {
        let client = config.build_client().context("Failed to build HTTP client")?;
        Ok(Self {
            parts: config.parts,
            coordinator: TransferCoordinator::new(client.clone(), config),
            client,
            output_dir,
            verify_mode,
            overwrite: false,
        })
    }

    /// Re-download files that already exist in the output directory.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_progress(mut self, multi_progress: MultiProgress) -> Self {
        self.coordinator = self.coordinator.with_progress(multi_progress);
        self
    }

    /// Runs the whole pipeline for one item: probe, plan, fetch, assemble, verify.
    ///
    /// Every failure ends up in the returned outcome so the caller can carry
    /// on with the next item.
    pub async fn download_file(&self, item: &DownloadItem) -> TransferOutcome {
        let url = item.url.as_str();
        let relative = match &item.path {
            Some(path) => sanitize_relative_path(path),
            None => get_filename_from_url(url).map(|name| PathBuf::from(sanitize_filename(&name))),
        };
        let relative = match relative {
            Ok(relative) => relative,
            Err(e) => return TransferOutcome::errored(url, &self.output_dir, format!("{e:#}")),
        };
        let filepath = self.output_dir.join(&relative);
        let filename = relative.display().to_string();

        let expected_hash = match (&self.verify_mode, &item.hash) {
            (VerifyMode::Off, _) => None,
            (_, Some(hash)) => Some(hash.clone()),
            (VerifyMode::On, None) => {
                return TransferOutcome::errored(url, &filepath, "hash verification required but no hash is known");
            }
            (VerifyMode::Auto, None) => None,
        };

        let total_size = match probe::probe(&self.client, url).await {
            Ok(size) => size,
            Err(e) => {
                warn!(url, error = %e, "skipping file");
                return TransferOutcome::errored(url, &filepath, e);
            }
        };

        if !self.overwrite {
            if let Ok(metadata) = fs::metadata(&filepath).await {
                if metadata.is_file() && metadata.len() == total_size {
                    info!(file = %filename, size = total_size, "already present, skipping");
                    let mut outcome = TransferOutcome::completed(url, &filepath, total_size);
                    outcome.skipped = true;
                    return outcome;
                }
                warn!(
                    file = %filename,
                    size = metadata.len(),
                    expected = total_size,
                    "existing file is incomplete, downloading again"
                );
            }
        }

        if let Some(parent) = filepath.parent() {
            if let Err(e) = fs::create_dir_all(parent).await {
                return TransferOutcome::errored(url, &filepath, format!("failed to create {}: {e}", parent.display()));
            }
        }

        let plan = plan::plan(total_size, self.parts);
        let job = match TransferJob::new(url, &filepath, total_size, plan.part_count()) {
            Ok(job) => job,
            Err(e) => return TransferOutcome::errored(url, &filepath, e),
        };

        let mut outcome = self.coordinator.run(&job, &plan.ranges).await;

        if outcome.succeeded {
            if let Some(expected) = expected_hash {
                match verify(&filepath, &expected).await {
                    Ok(digest) => outcome.sha256 = Some(digest),
                    Err(e) => {
                        warn!(file = %filename, error = %e, "verification failed");
                        return TransferOutcome::errored(url, &filepath, format!("{e:#}"));
                    }
                }
            }
        }

        outcome
    }
}

/// Checks the SHA-256 of `path`; a corrupt file is removed.
async fn verify(path: &Path, expected: &str) -> Result<String> {
    let computed = hashing::calculate_hash(path).await?;
    if !expected.eq_ignore_ascii_case(&computed) {
        let _ = fs::remove_file(path).await;
        anyhow::bail!("Hash mismatch: expected {}, got {}", expected, computed);
    }
    Ok(computed)
}
