use crate::git_sync::GitBackend;
use crate::model::SyncOperation;
use crate::provider::{ProviderFuture, RepoLister};
use anyhow::bail;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// In-memory backend whose failures are scripted per repository.
#[derive(Default)]
pub(crate) struct ScriptedBackend {
    delay: Duration,
    scripts: Mutex<HashMap<String, VecDeque<Result<(), String>>>>,
    always_fail: Mutex<HashMap<String, String>>,
    local_copies: Mutex<HashSet<PathBuf>>,
    attempts: Mutex<HashMap<String, u32>>,
    operations: Mutex<HashMap<String, Vec<SyncOperation>>>,
    copy_on_failure: Mutex<HashSet<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedBackend {
    pub(crate) fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Queue outcomes for the next attempts of `repo`; later attempts succeed.
    pub(crate) fn script(&self, repo: &str, outcomes: Vec<Result<(), &str>>) {
        let queue = outcomes
            .into_iter()
            .map(|outcome| outcome.map_err(str::to_string))
            .collect();
        self.scripts.lock().unwrap().insert(repo.to_string(), queue);
    }

    pub(crate) fn fail_always(&self, repo: &str, message: &str) {
        self.always_fail
            .lock()
            .unwrap()
            .insert(repo.to_string(), message.to_string());
    }

    /// Failed attempts of `repo` still leave a usable local copy behind.
    pub(crate) fn leave_copy_on_failure(&self, repo: &str) {
        self.copy_on_failure
            .lock()
            .unwrap()
            .insert(repo.to_string());
    }

    pub(crate) fn operations(&self, repo: &str) -> Vec<SyncOperation> {
        self.operations
            .lock()
            .unwrap()
            .get(repo)
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn attempts(&self, repo: &str) -> u32 {
        self.attempts
            .lock()
            .unwrap()
            .get(repo)
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn perform(
        &self,
        operation: SyncOperation,
        repo: &str,
        path: &Path,
    ) -> anyhow::Result<()> {
        self.operations
            .lock()
            .unwrap()
            .entry(repo.to_string())
            .or_default()
            .push(operation);
        *self
            .attempts
            .lock()
            .unwrap()
            .entry(repo.to_string())
            .or_default() += 1;
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let always = self.always_fail.lock().unwrap().get(repo).cloned();
        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(repo)
            .and_then(|queue| queue.pop_front());
        let failure = always.or_else(|| scripted.and_then(Result::err));
        if failure.is_none() || self.copy_on_failure.lock().unwrap().contains(repo) {
            self.local_copies.lock().unwrap().insert(path.to_path_buf());
        }
        match failure {
            Some(message) => bail!("{message}"),
            None => Ok(()),
        }
    }
}

impl GitBackend for ScriptedBackend {
    fn has_local_copy(&self, path: &Path) -> bool {
        self.local_copies.lock().unwrap().contains(path)
    }

    fn clone_repo<'a>(
        &'a self,
        _owner: &'a str,
        repo: &'a str,
        path: &'a Path,
    ) -> ProviderFuture<'a, ()> {
        Box::pin(self.perform(SyncOperation::Clone, repo, path))
    }

    fn fetch_repo<'a>(&'a self, repo: &'a str, path: &'a Path) -> ProviderFuture<'a, ()> {
        Box::pin(self.perform(SyncOperation::Fetch, repo, path))
    }
}

pub(crate) struct StaticLister {
    pub(crate) result: Result<Vec<String>, String>,
}

impl StaticLister {
    pub(crate) fn names(names: &[&str]) -> Self {
        Self {
            result: Ok(names.iter().map(|name| name.to_string()).collect()),
        }
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
        }
    }
}

impl RepoLister for StaticLister {
    fn name(&self) -> &'static str {
        "static"
    }

    fn list_repos<'a>(&'a self, _owner: &'a str) -> ProviderFuture<'a, Vec<String>> {
        Box::pin(async move {
            match &self.result {
                Ok(names) => Ok(names.clone()),
                Err(message) => bail!("{message}"),
            }
        })
    }
}

pub(crate) fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}
