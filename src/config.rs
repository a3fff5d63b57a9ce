use std::time::Duration;

pub const DEFAULT_PARTS: u64 = 5;
pub const DEFAULT_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(500);
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Tunables for one transfer engine instance.
///
/// Built once (usually from the CLI) and handed to each component when it is
/// constructed.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Number of segments each file is split into.
    pub parts: u64,
    /// Optional ceiling on concurrent fetches, independent of `parts`.
    pub max_workers: Option<usize>,
    /// Attempts per segment, including the first one.
    pub attempts: u32,
    /// Delay before retry `n` is `backoff * n`.
    pub backoff: Duration,
    /// Limit on a single fetch attempt, from request to last byte.
    pub attempt_timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            parts: DEFAULT_PARTS,
            max_workers: None,
            attempts: DEFAULT_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            user_agent: concat!("partdl/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl TransferConfig {
    /// Concurrency degree for a job split into `part_count` segments.
    pub fn worker_count(&self, part_count: usize) -> usize {
        let workers = match self.max_workers {
            Some(cap) if cap > 0 => part_count.min(cap),
            _ => part_count,
        };
        workers.max(1)
    }

    /// HTTP client shared by the probe and every fetcher.
    pub fn build_client(&self) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .user_agent(self.user_agent.clone())
            .connect_timeout(self.connect_timeout)
            .build()
    }
}
