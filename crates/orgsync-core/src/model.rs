use crate::error::SyncError;
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

/// Lifecycle of one repository within a run.
///
/// `Pending -> {Cloning | Fetching} -> {Completed | Failed}`. An active status
/// may be announced again while retries are in progress.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoStatus {
    Pending,
    Cloning,
    Fetching,
    Completed,
    Failed,
}

impl RepoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepoStatus::Pending => "pending",
            RepoStatus::Cloning => "cloning",
            RepoStatus::Fetching => "fetching",
            RepoStatus::Completed => "completed",
            RepoStatus::Failed => "failed",
        }
    }

    pub fn is_active(self) -> bool {
        matches!(self, RepoStatus::Cloning | RepoStatus::Fetching)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RepoStatus::Completed | RepoStatus::Failed)
    }

    pub fn can_transition_to(self, next: RepoStatus) -> bool {
        match self {
            RepoStatus::Pending => next.is_active(),
            RepoStatus::Cloning | RepoStatus::Fetching => next.is_active() || next.is_terminal(),
            RepoStatus::Completed | RepoStatus::Failed => false,
        }
    }
}

impl fmt::Display for RepoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single external operation a sync attempt performs.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOperation {
    Clone,
    Fetch,
}

impl SyncOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOperation::Clone => "clone",
            SyncOperation::Fetch => "fetch",
        }
    }

    pub fn active_status(self) -> RepoStatus {
        match self {
            SyncOperation::Clone => RepoStatus::Cloning,
            SyncOperation::Fetch => RepoStatus::Fetching,
        }
    }
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RepoRecord {
    pub name: String,
    pub status: RepoStatus,
    pub error: Option<String>,
    pub started_at: Option<OffsetDateTime>,
    pub finished_at: Option<OffsetDateTime>,
    pub retry_count: u32,
}

impl RepoRecord {
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: RepoStatus::Pending,
            error: None,
            started_at: None,
            finished_at: None,
            retry_count: 0,
        }
    }

    /// Time spent in the active and terminal states, measured up to `now`
    /// while the record is still running.
    pub fn elapsed(&self, now: OffsetDateTime) -> Option<time::Duration> {
        let started = self.started_at?;
        let end = self.finished_at.unwrap_or(now);
        Some(end - started)
    }
}

/// Message sent by a worker whenever a repository changes state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub name: String,
    pub status: RepoStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub retries: u32,
}

impl StatusUpdate {
    pub fn active(name: &str, operation: SyncOperation, retries: u32) -> Self {
        Self {
            name: name.to_string(),
            status: operation.active_status(),
            error: None,
            retries,
        }
    }

    pub fn completed(name: &str, retries: u32) -> Self {
        Self {
            name: name.to_string(),
            status: RepoStatus::Completed,
            error: None,
            retries,
        }
    }

    pub fn failed(name: &str, error: &SyncError, retries: u32) -> Self {
        Self {
            name: name.to_string(),
            status: RepoStatus::Failed,
            error: Some(error.to_string()),
            retries,
        }
    }
}
