use futures::stream::{FuturesUnordered, StreamExt};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use reqwest::Client;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::assembler;
use crate::config::TransferConfig;
use crate::fetcher::ChunkFetcher;
use crate::plan::RangeSpec;
use crate::state::{RangeFailure, SegmentResult, SegmentStatus, TransferJob, TransferOutcome};

/// Runs every segment of a job on a bounded pool and assembles the result.
pub struct TransferCoordinator {
    fetcher: ChunkFetcher,
    config: TransferConfig,
    multi_progress: MultiProgress,
}

impl TransferCoordinator {
    pub fn new(client: Client, config: TransferConfig) -> Self {
        Self {
            fetcher: ChunkFetcher::new(client, &config),
            config,
            multi_progress: MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
        }
    }

    /// Draw per-job progress bars on `multi_progress` instead of nowhere.
    pub fn with_progress(mut self, multi_progress: MultiProgress) -> Self {
        self.multi_progress = multi_progress;
        self
    }

    /// Fetches every range of `job` and, if all of them arrive, assembles them.
    ///
    /// A failed segment does not stop its siblings. When anything failed the
    /// completed segment files are left on disk and no assembly happens.
    pub async fn run(&self, job: &TransferJob, ranges: &[RangeSpec]) -> TransferOutcome {
        let segments = self.fetch_all(job, ranges).await;
        self.complete(job, segments).await
    }

    /// Turns fetched segments into the job's outcome.
    ///
    /// Any failed segment ends the job without assembly. Otherwise the
    /// segments are assembled; an assembly error naming a range is recorded
    /// against that range, any other one as the job-level error.
    pub async fn complete(&self, job: &TransferJob, segments: Vec<SegmentResult>) -> TransferOutcome {
        let failures: Vec<RangeFailure> = segments
            .iter()
            .filter_map(|s| {
                s.failure_reason().map(|reason| RangeFailure {
                    range: s.range,
                    reason: reason.to_string(),
                })
            })
            .collect();

        if !failures.is_empty() {
            warn!(
                url = job.url(),
                failed = failures.len(),
                parts = job.part_count(),
                "transfer incomplete, keeping fetched segments"
            );
            return TransferOutcome::with_failures(job.url(), job.destination(), failures);
        }

        let fetched: u64 = segments.iter().map(|s| s.bytes_written).sum();
        if fetched != job.total_size() {
            warn!(
                url = job.url(),
                fetched,
                expected = job.total_size(),
                "ranges do not cover the resource"
            );
        }

        match assembler::assemble(job.destination(), segments).await {
            Ok(bytes) => {
                info!(
                    url = job.url(),
                    destination = %job.destination().display(),
                    bytes,
                    "transfer complete"
                );
                TransferOutcome::completed(job.url(), job.destination(), bytes)
            }
            Err(e) => {
                error!(
                    url = job.url(),
                    destination = %job.destination().display(),
                    error = %e,
                    "assembly failed after all segments completed"
                );
                match e.range() {
                    Some(range) => TransferOutcome::with_failures(
                        job.url(),
                        job.destination(),
                        vec![RangeFailure {
                            range,
                            reason: e.to_string(),
                        }],
                    ),
                    None => TransferOutcome::errored(job.url(), job.destination(), e),
                }
            }
        }
    }

    /// Fetches all ranges concurrently and returns the segments in completion order.
    pub async fn fetch_all(&self, job: &TransferJob, ranges: &[RangeSpec]) -> Vec<SegmentResult> {
        let workers = self.config.worker_count(ranges.len());
        let semaphore = Arc::new(Semaphore::new(workers));

        let pb = self.multi_progress.add(ProgressBar::new(ranges.len() as u64));
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} parts {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb.set_message(
            job.destination()
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );

        info!(
            url = job.url(),
            size = job.total_size(),
            parts = ranges.len(),
            workers,
            "starting segmented transfer"
        );

        let mut tasks = FuturesUnordered::new();
        for &range in ranges {
            let fetcher = self.fetcher.clone();
            let semaphore = semaphore.clone();
            let url = job.url().to_string();
            let path = job.segment_path(&range);
            let task_path = path.clone();

            let handle = tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    let mut segment = SegmentResult::pending(range, task_path);
                    segment.status = SegmentStatus::Failed("worker pool closed".into());
                    return segment;
                };
                fetcher.fetch(&url, range, task_path).await
            });

            tasks.push(async move { (range, path, handle.await) });
        }

        let mut segments = Vec::with_capacity(ranges.len());
        while let Some((range, path, joined)) = tasks.next().await {
            let segment = joined.unwrap_or_else(|e| {
                error!(part = range.index + 1, error = %e, "segment worker aborted");
                let mut segment = SegmentResult::pending(range, path);
                segment.status = SegmentStatus::Failed(format!("worker aborted: {e}"));
                segment
            });
            pb.inc(1);
            segments.push(segment);
        }

        let failed = segments.iter().filter(|s| !s.is_complete()).count();
        if failed == 0 {
            pb.finish_with_message("done");
        } else {
            pb.abandon_with_message(format!("{failed} part(s) failed"));
        }

        segments
    }
}
