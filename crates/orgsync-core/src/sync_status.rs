use crate::model::{RepoRecord, RepoStatus, StatusUpdate};
use serde::Serialize;
use std::collections::HashMap;
use time::OffsetDateTime;
use tokio::sync::{mpsc, watch};
use tracing::debug;

/// Name of the placeholder record shown when repository discovery fails.
pub const DISCOVERY_PLACEHOLDER: &str = "Error fetching repos";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunTotals {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub active: usize,
    pub pending: usize,
}

impl RunTotals {
    pub fn settled(&self) -> usize {
        self.completed + self.failed
    }
}

/// Owner of every repository record for a run. Only the consumer of the
/// status channel mutates it.
#[derive(Clone, Debug)]
pub struct StatusBoard {
    owner: String,
    records: Vec<RepoRecord>,
    index: HashMap<String, usize>,
    discovery_error: Option<String>,
}

impl StatusBoard {
    pub fn new(owner: impl Into<String>, names: impl IntoIterator<Item = String>) -> Self {
        let mut records = Vec::new();
        let mut index = HashMap::new();
        for name in names {
            if index.contains_key(&name) {
                debug!(repo = %name, "duplicate repository name ignored");
                continue;
            }
            index.insert(name.clone(), records.len());
            records.push(RepoRecord::pending(name));
        }
        Self {
            owner: owner.into(),
            records,
            index,
            discovery_error: None,
        }
    }

    /// A board holding a single failed placeholder, so renderers still reach
    /// a finished state when listing fails.
    pub fn discovery_failed(owner: impl Into<String>, error: &anyhow::Error) -> Self {
        let detail = format!("{error:#}");
        let now = OffsetDateTime::now_utc();
        let mut board = Self::new(owner, [DISCOVERY_PLACEHOLDER.to_string()]);
        let record = &mut board.records[0];
        record.status = RepoStatus::Failed;
        record.error = Some(detail.clone());
        record.started_at = Some(now);
        record.finished_at = Some(now);
        board.discovery_error = Some(detail);
        board
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn discovery_error(&self) -> Option<&str> {
        self.discovery_error.as_deref()
    }

    pub fn records(&self) -> &[RepoRecord] {
        &self.records
    }

    pub fn record(&self, name: &str) -> Option<&RepoRecord> {
        self.index.get(name).map(|&idx| &self.records[idx])
    }

    pub fn names(&self) -> Vec<String> {
        self.records.iter().map(|record| record.name.clone()).collect()
    }

    pub fn total(&self) -> usize {
        self.records.len()
    }

    pub fn apply(&mut self, update: &StatusUpdate) -> bool {
        self.apply_at(update, OffsetDateTime::now_utc())
    }

    /// Applies `update` as of `now`. Unknown names and transitions that would
    /// move a record backwards are ignored; returns whether anything changed.
    pub fn apply_at(&mut self, update: &StatusUpdate, now: OffsetDateTime) -> bool {
        let Some(&idx) = self.index.get(&update.name) else {
            debug!(repo = %update.name, "status update for unknown repo ignored");
            return false;
        };
        let record = &mut self.records[idx];
        if !record.status.can_transition_to(update.status) {
            debug!(
                repo = %update.name,
                from = %record.status,
                to = %update.status,
                "out of order status update ignored"
            );
            return false;
        }

        record.status = update.status;
        record.retry_count = record.retry_count.max(update.retries);
        if update.status.is_active() {
            record.started_at.get_or_insert(now);
        }
        if update.status.is_terminal() {
            record.finished_at = Some(now);
        }
        record.error = match update.status {
            RepoStatus::Failed => Some(
                update
                    .error
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string()),
            ),
            _ => None,
        };
        true
    }

    fn count(&self, status: RepoStatus) -> usize {
        self.records
            .iter()
            .filter(|record| record.status == status)
            .count()
    }

    pub fn count_completed(&self) -> usize {
        self.count(RepoStatus::Completed)
    }

    pub fn count_failed(&self) -> usize {
        self.count(RepoStatus::Failed)
    }

    pub fn count_active(&self) -> usize {
        self.records
            .iter()
            .filter(|record| record.status.is_active())
            .count()
    }

    pub fn count_pending(&self) -> usize {
        self.count(RepoStatus::Pending)
    }

    pub fn count_settled(&self) -> usize {
        self.records
            .iter()
            .filter(|record| record.status.is_terminal())
            .count()
    }

    pub fn is_done(&self) -> bool {
        self.count_settled() == self.total()
    }

    pub fn progress(&self) -> f64 {
        if self.records.is_empty() {
            return 1.0;
        }
        self.count_settled() as f64 / self.total() as f64
    }

    pub fn totals(&self) -> RunTotals {
        let mut totals = RunTotals {
            total: self.records.len(),
            ..RunTotals::default()
        };
        for record in &self.records {
            match record.status {
                RepoStatus::Pending => totals.pending += 1,
                RepoStatus::Cloning | RepoStatus::Fetching => totals.active += 1,
                RepoStatus::Completed => totals.completed += 1,
                RepoStatus::Failed => totals.failed += 1,
            }
        }
        totals
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            owner: self.owner.clone(),
            records: self.records.clone(),
            totals: self.totals(),
            done: self.is_done(),
            finished: false,
            discovery_error: self.discovery_error.clone(),
        }
    }
}

/// Owned point-in-time copy of a board, safe to hand to another thread.
#[derive(Clone, Debug, Default)]
pub struct BoardSnapshot {
    pub owner: String,
    pub records: Vec<RepoRecord>,
    pub totals: RunTotals,
    /// Every record is settled.
    pub done: bool,
    /// The engine has stopped producing updates, settled or not.
    pub finished: bool,
    pub discovery_error: Option<String>,
}

impl BoardSnapshot {
    pub fn progress(&self) -> f64 {
        if self.totals.total == 0 {
            return 1.0;
        }
        self.totals.settled() as f64 / self.totals.total as f64
    }
}

/// Receives board changes as the engine applies them.
pub trait StatusObserver: Send {
    fn on_start(&mut self, _board: &StatusBoard) {}
    fn on_update(&mut self, update: &StatusUpdate, board: &StatusBoard);
    fn on_finish(&mut self, _board: &StatusBoard) {}
}

/// Publishes a fresh snapshot on a watch channel after every change.
pub struct SnapshotPublisher {
    tx: watch::Sender<BoardSnapshot>,
}

impl SnapshotPublisher {
    pub fn channel() -> (Self, watch::Receiver<BoardSnapshot>) {
        let (tx, rx) = watch::channel(BoardSnapshot::default());
        (Self { tx }, rx)
    }
}

impl StatusObserver for SnapshotPublisher {
    fn on_start(&mut self, board: &StatusBoard) {
        self.tx.send_replace(board.snapshot());
    }

    fn on_update(&mut self, _update: &StatusUpdate, board: &StatusBoard) {
        self.tx.send_replace(board.snapshot());
    }

    fn on_finish(&mut self, board: &StatusBoard) {
        let mut snapshot = board.snapshot();
        snapshot.finished = true;
        self.tx.send_replace(snapshot);
    }
}

/// Applies updates in arrival order until the channel closes. Returns the
/// number of updates that changed the board.
pub async fn drive_updates<O>(
    updates: &mut mpsc::Receiver<StatusUpdate>,
    board: &mut StatusBoard,
    observer: &mut O,
) -> usize
where
    O: StatusObserver + ?Sized,
{
    let mut applied = 0;
    while let Some(update) = updates.recv().await {
        if board.apply(&update) {
            applied += 1;
            observer.on_update(&update, board);
        }
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::model::SyncOperation;
    use crate::test_support::names;

    fn at(seconds: i64) -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH + time::Duration::seconds(seconds)
    }

    #[test]
    fn stamps_start_once_and_end_on_settle() {
        let mut board = StatusBoard::new("acme", names(&["api"]));
        assert!(board.apply_at(&StatusUpdate::active("api", SyncOperation::Clone, 0), at(1)));
        assert!(board.apply_at(&StatusUpdate::active("api", SyncOperation::Clone, 1), at(4)));

        let record = board.record("api").unwrap();
        assert_eq!(record.started_at, Some(at(1)));
        assert_eq!(record.finished_at, None);
        assert_eq!(record.retry_count, 1);

        assert!(board.apply_at(&StatusUpdate::completed("api", 1), at(9)));
        let record = board.record("api").unwrap();
        assert_eq!(record.status, RepoStatus::Completed);
        assert_eq!(record.finished_at, Some(at(9)));
        assert!(record.started_at <= record.finished_at);
        assert_eq!(record.error, None);
    }

    #[test]
    fn ignores_unknown_names_and_regressions() {
        let mut board = StatusBoard::new("acme", names(&["api"]));
        assert!(!board.apply(&StatusUpdate::completed("web", 0)));
        assert!(!board.apply(&StatusUpdate::completed("api", 0)));
        assert_eq!(board.record("api").unwrap().status, RepoStatus::Pending);

        board.apply(&StatusUpdate::active("api", SyncOperation::Fetch, 0));
        board.apply(&StatusUpdate::completed("api", 0));
        assert!(!board.apply(&StatusUpdate::active("api", SyncOperation::Fetch, 0)));
        assert_eq!(board.record("api").unwrap().status, RepoStatus::Completed);
    }

    #[test]
    fn failed_records_keep_error_detail() {
        let mut board = StatusBoard::new("acme", names(&["api"]));
        let err = SyncError::Operation {
            repo: "api".to_string(),
            operation: SyncOperation::Clone,
            detail: "repository not found".to_string(),
        };
        board.apply(&StatusUpdate::active("api", SyncOperation::Clone, 0));
        board.apply(&StatusUpdate::failed("api", &err, 0));

        let record = board.record("api").unwrap();
        assert_eq!(
            record.error.as_deref(),
            Some("failed to clone api: repository not found")
        );
        assert_eq!(record.retry_count, 0);
    }

    #[test]
    fn counts_and_done_track_records() {
        let mut board = StatusBoard::new("acme", names(&["a", "b", "c", "d"]));
        assert!(!board.is_done());
        board.apply(&StatusUpdate::active("a", SyncOperation::Clone, 0));
        board.apply(&StatusUpdate::active("b", SyncOperation::Clone, 0));
        board.apply(&StatusUpdate::active("c", SyncOperation::Fetch, 0));
        board.apply(&StatusUpdate::completed("a", 0));
        board.apply(&StatusUpdate::failed(
            "b",
            &SyncError::Cancelled {
                repo: "b".to_string(),
            },
            0,
        ));

        assert_eq!(board.count_completed(), 1);
        assert_eq!(board.count_failed(), 1);
        assert_eq!(board.count_active(), 1);
        assert_eq!(board.count_pending(), 1);
        assert_eq!(board.count_settled(), 2);
        assert_eq!(board.progress(), 0.5);
        assert_eq!(
            board.totals(),
            RunTotals {
                total: 4,
                completed: 1,
                failed: 1,
                active: 1,
                pending: 1,
            }
        );
        assert!(!board.is_done());
    }

    #[test]
    fn duplicate_names_collapse_to_one_record() {
        let board = StatusBoard::new("acme", names(&["a", "b", "a"]));
        assert_eq!(board.total(), 2);
        assert_eq!(board.names(), names(&["a", "b"]));
    }

    #[test]
    fn empty_board_is_done() {
        let board = StatusBoard::new("acme", Vec::new());
        assert!(board.is_done());
        assert_eq!(board.progress(), 1.0);
    }

    #[test]
    fn discovery_failure_yields_single_failed_record() {
        let err = anyhow::anyhow!("HTTP 404").context("list repos for acme");
        let board = StatusBoard::discovery_failed("acme", &err);
        assert_eq!(board.total(), 1);
        assert!(board.is_done());
        assert_eq!(board.count_failed(), 1);
        let record = board.record(DISCOVERY_PLACEHOLDER).unwrap();
        assert_eq!(record.error.as_deref(), Some("list repos for acme: HTTP 404"));
        assert_eq!(board.discovery_error(), Some("list repos for acme: HTTP 404"));
    }

    #[test]
    fn snapshot_is_detached_from_board() {
        let mut board = StatusBoard::new("acme", names(&["api"]));
        let snapshot = board.snapshot();
        board.apply(&StatusUpdate::active("api", SyncOperation::Clone, 0));
        assert_eq!(snapshot.records[0].status, RepoStatus::Pending);
        assert_eq!(snapshot.totals.pending, 1);
        assert!(!snapshot.finished);
    }

    #[tokio::test]
    async fn publisher_marks_final_snapshot_finished() {
        let (mut publisher, rx) = SnapshotPublisher::channel();
        let (tx, mut updates) = mpsc::channel(4);
        let mut board = StatusBoard::new("acme", names(&["api"]));
        tx.send(StatusUpdate::active("api", SyncOperation::Clone, 0))
            .await
            .unwrap();
        tx.send(StatusUpdate::completed("api", 0)).await.unwrap();
        drop(tx);

        publisher.on_start(&board);
        let applied = drive_updates(&mut updates, &mut board, &mut publisher).await;
        publisher.on_finish(&board);

        assert_eq!(applied, 2);
        let snapshot = rx.borrow().clone();
        assert!(snapshot.finished);
        assert!(snapshot.done);
        assert_eq!(snapshot.totals.completed, 1);
    }
}
