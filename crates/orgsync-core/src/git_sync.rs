use crate::process::run_command;
use crate::provider::ProviderFuture;
use git2::Repository;
use std::ffi::OsStr;
use std::path::Path;
use tracing::{debug, info};

/// Clone-or-fetch capability for a single repository.
pub trait GitBackend: Send + Sync {
    /// Whether a usable local copy already exists at `path`.
    fn has_local_copy(&self, path: &Path) -> bool;

    fn clone_repo<'a>(
        &'a self,
        owner: &'a str,
        repo: &'a str,
        path: &'a Path,
    ) -> ProviderFuture<'a, ()>;

    fn fetch_repo<'a>(&'a self, repo: &'a str, path: &'a Path) -> ProviderFuture<'a, ()>;
}

/// Uses the GitHub CLI to clone and plain `git` to fetch.
#[derive(Clone, Copy, Debug, Default)]
pub struct GitCliBackend;

impl GitBackend for GitCliBackend {
    fn has_local_copy(&self, path: &Path) -> bool {
        is_local_repo(path)
    }

    fn clone_repo<'a>(
        &'a self,
        owner: &'a str,
        repo: &'a str,
        path: &'a Path,
    ) -> ProviderFuture<'a, ()> {
        Box::pin(async move {
            info!(repo = %repo, path = %path.display(), "cloning repo");
            let slug = format!("{owner}/{repo}");
            run_command(
                "gh",
                [
                    OsStr::new("repo"),
                    OsStr::new("clone"),
                    OsStr::new(&slug),
                    path.as_os_str(),
                ],
            )
            .await?;
            Ok(())
        })
    }

    fn fetch_repo<'a>(&'a self, repo: &'a str, path: &'a Path) -> ProviderFuture<'a, ()> {
        Box::pin(async move {
            info!(repo = %repo, path = %path.display(), "fetching origin");
            run_command(
                "git",
                [
                    OsStr::new("-C"),
                    path.as_os_str(),
                    OsStr::new("fetch"),
                    OsStr::new("origin"),
                ],
            )
            .await?;
            Ok(())
        })
    }
}

/// A `.git` marker that also opens as a repository.
pub fn is_local_repo(path: &Path) -> bool {
    if !path.join(".git").exists() {
        return false;
    }
    match Repository::open(path) {
        Ok(_) => true,
        Err(err) => {
            debug!(path = %path.display(), error = %err, "git marker present but repo unreadable");
            false
        }
    }
}
