use anyhow::Context;
use orgsync_core::process::run_command;
use orgsync_core::provider::{ProviderFuture, RepoLister};
use serde::Deserialize;
use tracing::debug;

/// Upper bound passed to `gh repo list`.
pub const LIST_LIMIT: u32 = 1000;

#[derive(Debug, Deserialize)]
struct RepoItem {
    name: String,
}

/// Lists repositories through the GitHub CLI, reusing its stored login.
#[derive(Clone, Copy, Debug, Default)]
pub struct GhCliLister;

impl GhCliLister {
    pub fn new() -> Self {
        Self
    }
}

impl RepoLister for GhCliLister {
    fn name(&self) -> &'static str {
        "gh"
    }

    fn list_repos<'a>(&'a self, owner: &'a str) -> ProviderFuture<'a, Vec<String>> {
        Box::pin(async move {
            let limit = LIST_LIMIT.to_string();
            let stdout = run_command(
                "gh",
                [
                    "repo",
                    "list",
                    owner,
                    "--json",
                    "name",
                    "--limit",
                    limit.as_str(),
                ],
            )
            .await?;
            let names = parse_repo_list(&stdout)?;
            debug!(owner = %owner, repos = names.len(), "gh repo list returned");
            Ok(names)
        })
    }
}

pub(crate) fn parse_repo_list(payload: &str) -> anyhow::Result<Vec<String>> {
    let items: Vec<RepoItem> =
        serde_json::from_str(payload.trim()).context("parse gh repo list output")?;
    Ok(items
        .into_iter()
        .map(|item| item.name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect())
}
