pub mod github;
pub mod simulated;

use orgsync_core::git_sync::{GitBackend, GitCliBackend};
use orgsync_core::provider::RepoLister;
use simulated::{SimulatedOrg, SimulationSettings};
use std::sync::Arc;

/// Where repositories come from and how they are synced.
#[derive(Clone, Debug, PartialEq)]
pub enum RepoSource {
    /// `gh` for listing and cloning, `git` for fetching.
    GhCli,
    Simulated(SimulationSettings),
}

/// Listing and sync halves of one source.
pub struct SourceParts {
    pub lister: Arc<dyn RepoLister>,
    pub backend: Arc<dyn GitBackend>,
}

impl RepoSource {
    pub fn label(&self) -> &'static str {
        match self {
            RepoSource::GhCli => "gh",
            RepoSource::Simulated(_) => "simulated",
        }
    }

    pub fn build(&self) -> SourceParts {
        match self {
            RepoSource::GhCli => SourceParts {
                lister: Arc::new(github::GhCliLister::new()),
                backend: Arc::new(GitCliBackend),
            },
            RepoSource::Simulated(settings) => {
                // One instance serves both halves so cloned repos are fetched
                // on the next pass.
                let org = Arc::new(SimulatedOrg::new(settings.clone()));
                SourceParts {
                    lister: org.clone(),
                    backend: org,
                }
            }
        }
    }
}
