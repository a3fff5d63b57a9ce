use futures::StreamExt;
use reqwest::{header, Client};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, warn};

use crate::config::TransferConfig;
use crate::error::{FetchError, TransferError};
use crate::plan::RangeSpec;
use crate::state::{SegmentResult, SegmentStatus};

/// Downloads single byte ranges into temporary segment files.
#[derive(Clone)]
pub struct ChunkFetcher {
    client: Client,
    attempts: u32,
    backoff: Duration,
    attempt_timeout: Duration,
}

impl ChunkFetcher {
    pub fn new(client: Client, config: &TransferConfig) -> Self {
        Self {
            client,
            attempts: config.attempts.max(1),
            backoff: config.backoff,
            attempt_timeout: config.attempt_timeout,
        }
    }

    /// Fetches `range` of `url` into `path`.
    ///
    /// Transient errors are retried; once attempts run out the segment comes
    /// back as `Failed` with the last error as reason. Never returns an error.
    pub async fn fetch(&self, url: &str, range: RangeSpec, path: PathBuf) -> SegmentResult {
        let mut segment = SegmentResult::pending(range, path);
        segment.status = SegmentStatus::InProgress;
        let mut attempt = 0;

        loop {
            attempt += 1;

            let result = match tokio::time::timeout(
                self.attempt_timeout,
                self.fetch_once(url, &range, &segment.path),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout(self.attempt_timeout)),
            };

            match result {
                Ok(written) => {
                    debug!(part = range.index + 1, bytes = written, attempt, "segment complete");
                    segment.bytes_written = written;
                    segment.status = SegmentStatus::Complete;
                    return segment;
                }
                Err(e) if attempt >= self.attempts => {
                    warn!(part = range.index + 1, attempt, error = %e, "segment failed");
                    // A half-written segment is useless to anyone.
                    let _ = fs::remove_file(&segment.path).await;
                    segment.bytes_written = 0;
                    segment.status = SegmentStatus::Failed(
                        TransferError::SegmentFailure {
                            index: range.index,
                            attempts: attempt,
                            reason: e.to_string(),
                        }
                        .to_string(),
                    );
                    return segment;
                }
                Err(e) => {
                    let delay = self.backoff * attempt;
                    warn!(
                        part = range.index + 1,
                        attempt,
                        error = %e,
                        "segment attempt failed, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn fetch_once(&self, url: &str, range: &RangeSpec, path: &Path) -> Result<u64, FetchError> {
        let response = self
            .client
            .get(url)
            .header(header::RANGE, range.header_value())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let expected = range.len();
        let mut writer = BufWriter::new(File::create(path).await?);
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(item) = stream.next().await {
            let chunk = item?;
            written += chunk.len() as u64;
            if written > expected {
                return Err(FetchError::Overflow { expected });
            }
            writer.write_all(&chunk).await?;
        }

        writer.flush().await?;

        if written != expected {
            return Err(FetchError::LengthMismatch {
                expected,
                received: written,
            });
        }

        Ok(written)
    }
}
