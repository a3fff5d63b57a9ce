use anyhow::{bail, Context, Result};
use indicatif::{HumanBytes, MultiProgress, ProgressDrawTarget};
use std::path::Path;
use tokio::fs;
use tracing::info;

use crate::cli::{Args, VerifyMode};
use crate::downloader::Downloader;
use crate::providers::{self, DownloadItem};
use crate::state::TransferOutcome;

/// Resolves the file list, downloads every file and prints a summary.
///
/// Returns the outcome of every job; a failed job never stops the batch.
pub async fn run_downloads(args: &Args) -> Result<Vec<TransferOutcome>> {
    let items = resolve_items(args).await?;
    if items.is_empty() {
        bail!("Nothing to download");
    }

    if matches!(args.verify_hash, VerifyMode::On) {
        let missing: Vec<&str> = items
            .iter()
            .filter(|i| i.hash.is_none())
            .map(|i| i.url.as_str())
            .collect();
        if !missing.is_empty() {
            bail!("Hash verification is on, but these entries have no hash: {:?}", missing);
        }
    }

    if !args.output_dir.exists() {
        fs::create_dir_all(&args.output_dir)
            .await
            .context("Failed to create output directory")?;
    }

    let multi_progress = MultiProgress::new();
    multi_progress.set_draw_target(ProgressDrawTarget::stderr_with_hz(5));

    let downloader = Downloader::new(
        args.output_dir.clone(),
        args.transfer_config(),
        args.verify_hash.clone(),
    )?
    .overwrite(args.overwrite)
    .with_progress(multi_progress.clone());

    info!(files = items.len(), dir = %args.output_dir.display(), "starting downloads");

    let mut outcomes = Vec::with_capacity(items.len());
    for item in &items {
        let outcome = downloader.download_file(item).await;
        let _ = multi_progress.println(outcome.summary());
        outcomes.push(outcome);
    }

    print_summary(&outcomes);

    if let Some(report) = &args.report {
        write_report(report, &outcomes).await?;
    }

    Ok(outcomes)
}

async fn resolve_items(args: &Args) -> Result<Vec<DownloadItem>> {
    if let Some(tasks_file) = &args.tasks_file {
        return providers::read_tasks_file(tasks_file).await;
    }
    let Some(model) = &args.model else {
        bail!("Either a model or --tasks-file is required");
    };
    println!("Fetching file list for {} from {}...", model, args.provider);
    providers::fetch_urls(&args.provider, model, args.revision()).await
}

fn print_summary(outcomes: &[TransferOutcome]) {
    let succeeded = outcomes.iter().filter(|o| o.succeeded).count();
    let bytes: u64 = outcomes
        .iter()
        .filter(|o| o.succeeded && !o.skipped)
        .map(|o| o.bytes_written)
        .sum();

    println!();
    println!(
        "Summary: Files: {}/{} | Downloaded: {}",
        succeeded,
        outcomes.len(),
        HumanBytes(bytes)
    );
    for outcome in outcomes.iter().filter(|o| !o.succeeded) {
        println!("  {}", outcome.summary());
    }
}

pub async fn write_report(path: &Path, outcomes: &[TransferOutcome]) -> Result<()> {
    let json = serde_json::to_string_pretty(outcomes)?;
    fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    Ok(())
}
