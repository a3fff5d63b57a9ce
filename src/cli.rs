use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{self, TransferConfig};
use crate::providers;

#[derive(ValueEnum, Clone, Debug, PartialEq, Eq)]
pub enum VerifyMode {
    /// Verify only files that come with a published hash.
    Auto,
    /// Require a hash for every file.
    On,
    Off,
}

/// Downloads model files in parallel byte-range segments.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Model page URL or `org/name` id
    #[arg(index = 1, required_unless_present = "tasks_file")]
    pub model: Option<String>,

    /// Directory to save downloaded files
    #[arg(short = 'o', long = "output-dir", default_value = "downloads")]
    pub output_dir: PathBuf,

    /// Number of parts to split each file into
    #[arg(short = 'p', long, default_value_t = config::DEFAULT_PARTS)]
    pub parts: u64,

    /// Upper bound on concurrent segment fetches (defaults to --parts)
    #[arg(long)]
    pub max_workers: Option<usize>,

    /// Attempts per segment before it is reported as failed
    #[arg(long, default_value_t = config::DEFAULT_ATTEMPTS)]
    pub retries: u32,

    /// Timeout for a single segment attempt, in seconds
    #[arg(long, default_value_t = config::DEFAULT_ATTEMPT_TIMEOUT.as_secs())]
    pub timeout_secs: u64,

    /// Provider used to list the model files (huggingface, modelscope)
    #[arg(short = 'P', long, default_value = "huggingface")]
    pub provider: String,

    /// Revision/branch used when generating resolve URLs
    /// (defaults to `main` on Hugging Face and `master` on ModelScope)
    #[arg(short = 'b', long = "branch")]
    pub branch: Option<String>,

    /// Read `url[|sha256]` lines from this file instead of asking a provider
    #[arg(short = 't', long = "tasks-file", conflicts_with = "model")]
    pub tasks_file: Option<PathBuf>,

    /// Hash verification: auto (only when hash provided), on (require hash), off (skip)
    #[arg(long = "verify-hash", value_enum, default_value = "auto")]
    pub verify_hash: VerifyMode,

    /// Download files again even if they already exist
    #[arg(long)]
    pub overwrite: bool,

    /// Write a JSON report of every transfer to this path
    #[arg(long)]
    pub report: Option<PathBuf>,
}

impl Args {
    /// The `--branch` value, or the provider's usual default branch.
    pub fn revision(&self) -> &str {
        self.branch
            .as_deref()
            .unwrap_or_else(|| providers::default_revision(&self.provider))
    }

    pub fn transfer_config(&self) -> TransferConfig {
        TransferConfig {
            parts: self.parts,
            max_workers: self.max_workers,
            attempts: self.retries,
            attempt_timeout: Duration::from_secs(self.timeout_secs),
            ..TransferConfig::default()
        }
    }
}
