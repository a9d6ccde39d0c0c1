use crate::error::SyncError;
use crate::git_sync::GitBackend;
use crate::model::SyncOperation;
use crate::paths::repo_path;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Performs exactly one clone or fetch for a repository, bounded by a timeout.
pub struct SyncExecutor {
    backend: Arc<dyn GitBackend>,
    owner: String,
    root: PathBuf,
    timeout: Duration,
}

impl SyncExecutor {
    pub fn new(
        backend: Arc<dyn GitBackend>,
        owner: impl Into<String>,
        root: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            backend,
            owner: owner.into(),
            root: root.into(),
            timeout,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn repo_path(&self, repo: &str) -> PathBuf {
        repo_path(&self.root, repo)
    }

    /// Fetch when a local copy exists, clone otherwise. The check touches the
    /// filesystem, so it runs on the blocking pool.
    pub async fn plan(&self, repo: &str) -> SyncOperation {
        let backend = Arc::clone(&self.backend);
        let path = self.repo_path(repo);
        match tokio::task::spawn_blocking(move || backend.has_local_copy(&path)).await {
            Ok(true) => SyncOperation::Fetch,
            Ok(false) => SyncOperation::Clone,
            Err(err) => {
                warn!(repo = %repo, error = %err, "local copy check failed; cloning");
                SyncOperation::Clone
            }
        }
    }

    pub async fn sync(&self, repo: &str) -> Result<(), SyncError> {
        let operation = self.plan(repo).await;
        self.execute(repo, operation).await
    }

    pub async fn execute(&self, repo: &str, operation: SyncOperation) -> Result<(), SyncError> {
        let path = self.repo_path(repo);
        let started = Instant::now();
        let work = match operation {
            SyncOperation::Clone => self.backend.clone_repo(&self.owner, repo, &path),
            SyncOperation::Fetch => self.backend.fetch_repo(repo, &path),
        };
        let result = match tokio::time::timeout(self.timeout, work).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(SyncError::Operation {
                repo: repo.to_string(),
                operation,
                detail: format!("{err:#}"),
            }),
            Err(_) => Err(SyncError::Timeout {
                repo: repo.to_string(),
                operation,
                timeout: self.timeout,
            }),
        };
        debug!(
            repo = %repo,
            operation = %operation,
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "sync attempt finished"
        );
        result
    }
}
