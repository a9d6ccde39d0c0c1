use crate::model::SyncOperation;
use std::time::Duration;

/// Substrings that mark a failure retrying cannot fix.
const NON_RETRYABLE_MARKERS: &[&str] = &[
    "authentication",
    "permission denied",
    "access denied",
    "not found",
    "does not exist",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("failed to {operation} {repo}: {detail}")]
    Operation {
        repo: String,
        operation: SyncOperation,
        detail: String,
    },
    #[error("{operation} of {repo} timed out after {timeout:?}")]
    Timeout {
        repo: String,
        operation: SyncOperation,
        timeout: Duration,
    },
    #[error("sync of {repo} cancelled")]
    Cancelled { repo: String },
}

impl SyncError {
    pub fn repo(&self) -> &str {
        match self {
            SyncError::Operation { repo, .. }
            | SyncError::Timeout { repo, .. }
            | SyncError::Cancelled { repo } => repo,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncError::Cancelled { .. })
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Cancelled { .. } => false,
            SyncError::Timeout { .. } => true,
            SyncError::Operation { detail, .. } => !is_non_retryable_message(detail),
        }
    }
}

pub fn is_non_retryable_message(message: &str) -> bool {
    let lowered = message.to_ascii_lowercase();
    NON_RETRYABLE_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}
