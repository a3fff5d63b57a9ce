use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

use crate::plan::RangeSpec;

/// Failures of the transfer engine.
///
/// Transient fetch errors ([`FetchError`]) are retried inside the fetcher and
/// never show up here. `SegmentFailure` is rendered into the job outcome
/// instead of being returned.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("unable to determine size of {url}: {reason}")]
    SizeUnknown { url: String, reason: String },

    #[error("invalid transfer job: {0}")]
    InvalidJob(String),

    #[error("segment {index} failed after {attempts} attempts: {reason}")]
    SegmentFailure {
        index: usize,
        attempts: u32,
        reason: String,
    },

    #[error(transparent)]
    Assembly(#[from] AssemblyError),
}

/// A single failed fetch attempt. Always retryable.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(StatusCode),

    #[error("expected {expected} bytes, received {received}")]
    LengthMismatch { expected: u64, received: u64 },

    #[error("body overflowed the requested range of {expected} bytes")]
    Overflow { expected: u64 },

    #[error("attempt timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("temporary storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// Raised when completed segments cannot be combined into the final file.
#[derive(Error, Debug)]
pub enum AssemblyError {
    #[error("segment {} ({}-{}) is missing at {}", .range.index, .range.start, .range.end, .path.display())]
    MissingSegment { range: RangeSpec, path: PathBuf },

    #[error("segment {} ({}-{}) holds {actual} bytes, expected {}", .range.index, .range.start, .range.end, .range.len())]
    SizeMismatch { range: RangeSpec, actual: u64 },

    #[error("segment {} ({}-{}) is not complete", .range.index, .range.start, .range.end)]
    Incomplete { range: RangeSpec },

    #[error("failed assembling {}: {source}", .path.display())]
    Io {
        range: Option<RangeSpec>,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AssemblyError {
    /// The range the error is about, if any.
    pub fn range(&self) -> Option<RangeSpec> {
        match self {
            Self::MissingSegment { range, .. }
            | Self::SizeMismatch { range, .. }
            | Self::Incomplete { range } => Some(*range),
            Self::Io { range, .. } => *range,
        }
    }
}
