use anyhow::bail;
use std::time::Duration;

pub const DEFAULT_MAX_CONCURRENCY: usize = 5;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 2;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// Run-wide sync settings. Built once at startup and never mutated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncConfig {
    pub max_concurrency: usize,
    /// Bound on a single clone or fetch, and on repository discovery.
    pub timeout: Duration,
    /// Retries after the first attempt.
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    pub channel_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            timeout: DEFAULT_TIMEOUT,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_concurrency == 0 {
            bail!("max concurrency must be at least 1");
        }
        if self.timeout.is_zero() {
            bail!("operation timeout must be greater than zero");
        }
        if self.channel_capacity == 0 {
            bail!("update channel capacity must be at least 1");
        }
        Ok(())
    }

    pub fn max_attempts(&self) -> u32 {
        self.retry_attempts.saturating_add(1)
    }
}
