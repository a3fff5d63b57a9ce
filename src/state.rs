use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::TransferError;
use crate::plan::RangeSpec;

/// One downloadable resource with a known size.
#[derive(Debug, Clone)]
pub struct TransferJob {
    url: String,
    destination: PathBuf,
    total_size: u64,
    part_count: usize,
}

impl TransferJob {
    pub fn new(
        url: impl Into<String>,
        destination: impl Into<PathBuf>,
        total_size: u64,
        part_count: usize,
    ) -> Result<Self, TransferError> {
        if total_size == 0 {
            return Err(TransferError::InvalidJob("total size must be positive".into()));
        }
        if part_count == 0 {
            return Err(TransferError::InvalidJob("part count must be at least 1".into()));
        }
        Ok(Self {
            url: url.into(),
            destination: destination.into(),
            total_size,
            part_count,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn part_count(&self) -> usize {
        self.part_count
    }

    /// Temporary file for the given range: `<destination>.part<N>`, 1-indexed.
    pub fn segment_path(&self, range: &RangeSpec) -> PathBuf {
        let mut name = self.destination.as_os_str().to_os_string();
        name.push(format!(".part{}", range.index + 1));
        PathBuf::from(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum SegmentStatus {
    Pending,
    InProgress,
    Complete,
    Failed(String),
}

/// A range and its temporary storage, tracked from dispatch to assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentResult {
    pub range: RangeSpec,
    pub path: PathBuf,
    pub status: SegmentStatus,
    /// Bytes on disk after the last attempt.
    pub bytes_written: u64,
}

impl SegmentResult {
    pub fn pending(range: RangeSpec, path: PathBuf) -> Self {
        Self {
            range,
            path,
            status: SegmentStatus::Pending,
            bytes_written: 0,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == SegmentStatus::Complete
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.status {
            SegmentStatus::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

/// A range that could not be delivered, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeFailure {
    pub range: RangeSpec,
    pub reason: String,
}

/// Terminal result of one job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferOutcome {
    pub url: String,
    pub destination: PathBuf,
    pub bytes_written: u64,
    pub succeeded: bool,
    /// Failed ranges, in ascending index order.
    pub failures: Vec<RangeFailure>,
    /// Failure not tied to any range (size probe, verification, I/O).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The destination already existed and nothing was fetched.
    #[serde(default)]
    pub skipped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    pub finished_at: DateTime<Utc>,
}

impl TransferOutcome {
    pub fn completed(url: impl Into<String>, destination: impl Into<PathBuf>, bytes_written: u64) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
            bytes_written,
            succeeded: true,
            failures: Vec::new(),
            error: None,
            skipped: false,
            sha256: None,
            finished_at: Utc::now(),
        }
    }

    pub fn with_failures(
        url: impl Into<String>,
        destination: impl Into<PathBuf>,
        mut failures: Vec<RangeFailure>,
    ) -> Self {
        failures.sort_by_key(|f| f.range.index);
        Self {
            succeeded: false,
            failures,
            ..Self::completed(url, destination, 0)
        }
    }

    pub fn errored(url: impl Into<String>, destination: impl Into<PathBuf>, error: impl ToString) -> Self {
        Self {
            succeeded: false,
            error: Some(error.to_string()),
            ..Self::completed(url, destination, 0)
        }
    }

    /// One line describing the outcome, for the end-of-run summary.
    pub fn summary(&self) -> String {
        let name = self
            .destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.url.clone());

        if self.skipped {
            return format!("SKIPPED  {name} (already present, {} bytes)", self.bytes_written);
        }
        if self.succeeded {
            return format!("OK       {name} ({} bytes)", self.bytes_written);
        }

        let mut reasons: Vec<String> = self
            .failures
            .iter()
            .map(|f| {
                format!(
                    "part {} [{}-{}]: {}",
                    f.range.index + 1,
                    f.range.start,
                    f.range.end,
                    f.reason
                )
            })
            .collect();
        if let Some(err) = &self.error {
            reasons.push(err.clone());
        }
        format!("FAILED   {name}: {}", reasons.join("; "))
    }
}
