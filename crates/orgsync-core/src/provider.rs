use std::future::Future;
use std::pin::Pin;

pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send + 'a>>;

/// Discovers the repositories owned by an organization or user.
pub trait RepoLister: Send + Sync {
    /// Short label used in logs, e.g. `gh` or `simulated`.
    fn name(&self) -> &'static str;

    /// Repository names in the order the remote returns them.
    fn list_repos<'a>(&'a self, owner: &'a str) -> ProviderFuture<'a, Vec<String>>;
}
