use anyhow::bail;
use orgsync_core::git_sync::GitBackend;
use orgsync_core::provider::{ProviderFuture, RepoLister};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_REPO_COUNT: usize = 20;
pub const DEFAULT_FAIL_RATE: f64 = 0.1;

/// Share of failing repositories whose failure is permanent.
const NOT_FOUND_SHARE: f64 = 0.25;

const RETRYABLE_FAILURE: &str = "network timeout while contacting remote";
const PERMANENT_FAILURE: &str = "repository not found";

#[derive(Clone, Debug, PartialEq)]
pub struct SimulationSettings {
    pub repo_count: usize,
    /// Chance, per attempt, that an operation fails.
    pub fail_rate: f64,
    pub seed: u64,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            repo_count: DEFAULT_REPO_COUNT,
            fail_rate: DEFAULT_FAIL_RATE,
            seed: 0,
            min_delay: Duration::from_millis(200),
            max_delay: Duration::from_millis(2000),
        }
    }
}

/// Stand-in owner that needs neither network nor `gh`. Latency and failures
/// are derived from the seed, so a given seed replays the same run.
#[derive(Debug)]
pub struct SimulatedOrg {
    settings: SimulationSettings,
    local_copies: Mutex<HashSet<PathBuf>>,
    attempts: Mutex<HashMap<String, u32>>,
}

impl SimulatedOrg {
    pub fn new(settings: SimulationSettings) -> Self {
        Self {
            settings,
            local_copies: Mutex::new(HashSet::new()),
            attempts: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    pub fn repo_names(&self) -> Vec<String> {
        (1..=self.settings.repo_count)
            .map(|idx| format!("sim-repo-{idx:03}"))
            .collect()
    }

    fn roll(&self, repo: &str, attempt: u32, salt: &str) -> f64 {
        unit_roll(self.settings.seed, repo, attempt, salt)
    }

    fn delay_for(&self, repo: &str, attempt: u32) -> Duration {
        let SimulationSettings {
            min_delay,
            max_delay,
            ..
        } = self.settings;
        let span = max_delay.saturating_sub(min_delay);
        min_delay + span.mul_f64(self.roll(repo, attempt, "delay"))
    }

    /// Outcome of the given attempt for `repo`, without waiting.
    pub fn outcome(&self, repo: &str, attempt: u32) -> Result<(), &'static str> {
        if self.roll(repo, attempt, "fail") >= self.settings.fail_rate {
            return Ok(());
        }
        if self.roll(repo, 0, "kind") < NOT_FOUND_SHARE {
            Err(PERMANENT_FAILURE)
        } else {
            Err(RETRYABLE_FAILURE)
        }
    }

    fn next_attempt(&self, repo: &str) -> u32 {
        let mut attempts = recover(self.attempts.lock());
        let counter = attempts.entry(repo.to_string()).or_default();
        let attempt = *counter;
        *counter += 1;
        attempt
    }

    async fn simulate(&self, repo: &str, path: &Path) -> anyhow::Result<()> {
        let attempt = self.next_attempt(repo);
        let delay = self.delay_for(repo, attempt);
        debug!(repo = %repo, attempt, delay_ms = delay.as_millis() as u64, "simulating sync");
        tokio::time::sleep(delay).await;

        if let Err(message) = self.outcome(repo, attempt) {
            bail!("{message}");
        }
        recover(self.local_copies.lock()).insert(path.to_path_buf());
        Ok(())
    }
}

impl RepoLister for SimulatedOrg {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn list_repos<'a>(&'a self, _owner: &'a str) -> ProviderFuture<'a, Vec<String>> {
        Box::pin(async move {
            tokio::time::sleep(self.settings.min_delay).await;
            Ok(self.repo_names())
        })
    }
}

impl GitBackend for SimulatedOrg {
    fn has_local_copy(&self, path: &Path) -> bool {
        recover(self.local_copies.lock()).contains(path)
    }

    fn clone_repo<'a>(
        &'a self,
        _owner: &'a str,
        repo: &'a str,
        path: &'a Path,
    ) -> ProviderFuture<'a, ()> {
        Box::pin(self.simulate(repo, path))
    }

    fn fetch_repo<'a>(&'a self, repo: &'a str, path: &'a Path) -> ProviderFuture<'a, ()> {
        Box::pin(self.simulate(repo, path))
    }
}

/// Takes the guard even if a previous holder panicked.
fn recover<'a, T>(
    locked: Result<MutexGuard<'a, T>, PoisonError<MutexGuard<'a, T>>>,
) -> MutexGuard<'a, T> {
    locked.unwrap_or_else(|poisoned| {
        warn!("simulated state lock was poisoned; continuing with its contents");
        poisoned.into_inner()
    })
}

/// Maps (seed, repo, attempt, salt) to a stable value in `[0, 1)`.
pub fn unit_roll(seed: u64, repo: &str, attempt: u32, salt: &str) -> f64 {
    let mut hasher = Sha256::new();
    hasher.update(seed.to_be_bytes());
    hasher.update(repo.as_bytes());
    hasher.update(attempt.to_be_bytes());
    hasher.update(salt.as_bytes());
    let digest = hasher.finalize();
    let value = u64::from_be_bytes([
        digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6], digest[7],
    ]);
    (value >> 11) as f64 / (1u64 << 53) as f64
}
