//! Segmented parallel downloads.
//!
//! A file is probed for its size, split into byte ranges, fetched range by
//! range on a bounded pool of workers and stitched back together in order:
//!
//! [`probe`] → [`plan`] → [`coordinator`] (fanning out to [`fetcher`]) → [`assembler`]
//!
//! The remaining modules are the command line tool built around that engine.

pub mod assembler;
pub mod cli;
pub mod commands;
pub mod config;
pub mod coordinator;
pub mod downloader;
pub mod error;
pub mod fetcher;
pub mod hashing;
pub mod plan;
pub mod probe;
pub mod providers;
pub mod state;
pub mod utils;

pub use config::TransferConfig;
pub use coordinator::TransferCoordinator;
pub use error::{AssemblyError, FetchError, TransferError};
pub use fetcher::ChunkFetcher;
pub use plan::{RangePlan, RangeSpec};
pub use state::{SegmentResult, SegmentStatus, TransferJob, TransferOutcome};
