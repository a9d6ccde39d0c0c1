use crate::cancel::CancelSignal;
use crate::config::SyncConfig;
use crate::git_sync::GitBackend;
use crate::provider::RepoLister;
use crate::sync_coordinator::Coordinator;
use crate::sync_executor::SyncExecutor;
use crate::sync_status::{RunTotals, StatusBoard, StatusObserver, drive_updates};
use anyhow::{Context, bail};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub owner: String,
    #[serde(flatten)]
    pub totals: RunTotals,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discovery_error: Option<String>,
    pub cancelled: bool,
    pub elapsed_ms: u64,
}

impl RunSummary {
    /// Per-repository failures do not fail a run; a failed listing does.
    pub fn is_success(&self) -> bool {
        self.discovery_error.is_none()
    }
}

/// Lists an owner's repositories and brings each local copy up to date.
pub struct SyncEngine {
    config: SyncConfig,
    lister: Arc<dyn RepoLister>,
    backend: Arc<dyn GitBackend>,
    root: PathBuf,
    cancel: CancelSignal,
}

impl SyncEngine {
    pub fn new(
        config: SyncConfig,
        lister: Arc<dyn RepoLister>,
        backend: Arc<dyn GitBackend>,
        root: impl Into<PathBuf>,
    ) -> anyhow::Result<Self> {
        config.validate().context("validate sync config")?;
        Ok(Self {
            config,
            lister,
            backend,
            root: root.into(),
            cancel: CancelSignal::new(),
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Handle that stops the run when cancelled.
    pub fn cancel_signal(&self) -> CancelSignal {
        self.cancel.clone()
    }

    pub async fn discover(&self, owner: &str) -> anyhow::Result<Vec<String>> {
        let listing = tokio::time::timeout(self.config.timeout, self.lister.list_repos(owner));
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => bail!("cancelled while listing repositories"),
            listed = listing => match listed {
                Ok(result) => result.with_context(|| {
                    format!("list repositories for {owner} via {}", self.lister.name())
                }),
                Err(_) => bail!(
                    "listing repositories for {owner} timed out after {:?}",
                    self.config.timeout
                ),
            },
        }
    }

    /// Runs one full sync, reporting every applied change to `observer`.
    pub async fn run<O>(&self, owner: &str, observer: &mut O) -> RunSummary
    where
        O: StatusObserver + ?Sized,
    {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("sync_run", run_id = %run_id, owner = %owner);
        self.run_inner(run_id, owner, observer).instrument(span).await
    }

    async fn run_inner<O>(&self, run_id: String, owner: &str, observer: &mut O) -> RunSummary
    where
        O: StatusObserver + ?Sized,
    {
        let started = Instant::now();
        info!(
            lister = self.lister.name(),
            root = %self.root.display(),
            jobs = self.config.max_concurrency,
            "starting sync run"
        );

        let mut board = match self.discover(owner).await {
            Ok(names) => {
                info!(repos = names.len(), "discovered repositories");
                StatusBoard::new(owner, names)
            }
            Err(err) => {
                error!(error = %format!("{err:#}"), "repository discovery failed");
                StatusBoard::discovery_failed(owner, &err)
            }
        };
        observer.on_start(&board);

        if board.discovery_error().is_none() && board.total() > 0 {
            let executor = SyncExecutor::new(
                Arc::clone(&self.backend),
                owner,
                self.root.clone(),
                self.config.timeout,
            );
            let coordinator = Coordinator::new(&self.config, executor, self.cancel.clone());
            let (mut updates, pool) = coordinator.run(board.names());
            let applied = drive_updates(&mut updates, &mut board, &mut *observer).await;
            match pool.await {
                Ok(report) => debug!(
                    applied,
                    admitted = report.admitted,
                    abandoned = report.abandoned,
                    panicked = report.panicked,
                    "worker pool drained"
                ),
                Err(err) => warn!(error = %err, "worker pool supervisor failed"),
            }
        }
        observer.on_finish(&board);

        let totals = board.totals();
        let cancelled = self.cancel.is_cancelled();
        info!(
            total = totals.total,
            completed = totals.completed,
            failed = totals.failed,
            pending = totals.pending,
            cancelled,
            "sync run finished"
        );
        RunSummary {
            run_id,
            owner: owner.to_string(),
            totals,
            discovery_error: board.discovery_error().map(str::to_string),
            cancelled,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RepoStatus, StatusUpdate};
    use crate::sync_status::{BoardSnapshot, DISCOVERY_PLACEHOLDER};
    use crate::test_support::{ScriptedBackend, StaticLister};
    use std::collections::HashMap;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        updates: Vec<StatusUpdate>,
        peak_active: usize,
        started_with: Option<usize>,
        last: Option<BoardSnapshot>,
        cancel_on_first: Option<CancelSignal>,
    }

    impl StatusObserver for Recorder {
        fn on_start(&mut self, board: &StatusBoard) {
            self.started_with = Some(board.total());
        }

        fn on_update(&mut self, update: &StatusUpdate, board: &StatusBoard) {
            self.updates.push(update.clone());
            self.peak_active = self.peak_active.max(board.count_active());
            if let Some(cancel) = self.cancel_on_first.take() {
                cancel.cancel();
            }
        }

        fn on_finish(&mut self, board: &StatusBoard) {
            self.last = Some(board.snapshot());
        }
    }

    impl Recorder {
        fn board(&self) -> &BoardSnapshot {
            self.last.as_ref().unwrap()
        }

        fn status_of(&self, name: &str) -> RepoStatus {
            self.board()
                .records
                .iter()
                .find(|record| record.name == name)
                .unwrap()
                .status
        }
    }

    fn engine(lister: StaticLister, backend: Arc<ScriptedBackend>, config: SyncConfig) -> SyncEngine {
        SyncEngine::new(config, Arc::new(lister), backend, "/mirror").unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn syncs_every_listed_repo() {
        let backend = Arc::new(ScriptedBackend::with_delay(Duration::from_millis(50)));
        let engine = engine(
            StaticLister::names(&["a", "b", "c"]),
            Arc::clone(&backend),
            SyncConfig::default(),
        );
        let mut recorder = Recorder::default();
        let summary = engine.run("acme", &mut recorder).await;

        assert!(summary.is_success());
        assert!(!summary.cancelled);
        assert_eq!(summary.totals.completed, 3);
        assert_eq!(summary.totals.failed, 0);
        assert_eq!(recorder.started_with, Some(3));
        assert!(recorder.board().done);
        let names: Vec<&str> = recorder
            .board()
            .records
            .iter()
            .map(|record| record.name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_repo_fails_without_retry() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.fail_always("b", "repository not found");
        let engine = engine(
            StaticLister::names(&["a", "b"]),
            Arc::clone(&backend),
            SyncConfig::default(),
        );
        let mut recorder = Recorder::default();
        let summary = engine.run("acme", &mut recorder).await;

        assert_eq!(summary.totals.completed, 1);
        assert_eq!(summary.totals.failed, 1);
        assert!(summary.is_success());
        assert_eq!(backend.attempts("b"), 1);
        let record = recorder
            .board()
            .records
            .iter()
            .find(|record| record.name == "b")
            .unwrap();
        assert_eq!(record.status, RepoStatus::Failed);
        assert_eq!(record.retry_count, 0);
        assert!(record.error.as_deref().unwrap().contains("not found"));
    }

    #[tokio::test(start_paused = true)]
    async fn active_count_never_exceeds_limit() {
        let backend = Arc::new(ScriptedBackend::with_delay(Duration::from_millis(100)));
        let config = SyncConfig {
            max_concurrency: 2,
            ..SyncConfig::default()
        };
        let engine = engine(
            StaticLister::names(&["a", "b", "c", "d", "e"]),
            Arc::clone(&backend),
            config,
        );
        let mut recorder = Recorder::default();
        let summary = engine.run("acme", &mut recorder).await;

        assert_eq!(summary.totals.completed, 5);
        assert_eq!(recorder.peak_active, 2);
        assert!(backend.max_in_flight() <= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_new_work() {
        let backend = Arc::new(ScriptedBackend::with_delay(Duration::from_millis(100)));
        let config = SyncConfig {
            max_concurrency: 1,
            ..SyncConfig::default()
        };
        let engine = engine(
            StaticLister::names(&["a", "b", "c"]),
            Arc::clone(&backend),
            config,
        );
        let mut recorder = Recorder {
            cancel_on_first: Some(engine.cancel_signal()),
            ..Recorder::default()
        };
        let summary = engine.run("acme", &mut recorder).await;

        assert!(summary.cancelled);
        let first = &recorder.updates[0];
        assert!(first.status.is_active());
        assert!(
            recorder.updates[1..]
                .iter()
                .all(|update| !update.status.is_active())
        );
        assert_eq!(summary.totals.pending, 2);
        for record in &recorder.board().records {
            if record.name != first.name {
                assert_eq!(record.status, RepoStatus::Pending);
                assert_eq!(record.started_at, None);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn second_run_only_fetches() {
        let backend = Arc::new(ScriptedBackend::default());
        let lister = || StaticLister::names(&["a", "b"]);
        let first = engine(lister(), Arc::clone(&backend), SyncConfig::default());
        first.run("acme", &mut Recorder::default()).await;

        let second = engine(lister(), Arc::clone(&backend), SyncConfig::default());
        let mut recorder = Recorder::default();
        let summary = second.run("acme", &mut recorder).await;

        assert_eq!(summary.totals.completed, 2);
        assert!(
            recorder
                .updates
                .iter()
                .filter(|update| update.status.is_active())
                .all(|update| update.status == RepoStatus::Fetching)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn discovery_failure_reports_placeholder() {
        let backend = Arc::new(ScriptedBackend::default());
        let engine = engine(
            StaticLister::failing("HTTP 404: Not Found"),
            Arc::clone(&backend),
            SyncConfig::default(),
        );
        let mut recorder = Recorder::default();
        let summary = engine.run("acme", &mut recorder).await;

        assert!(!summary.is_success());
        assert!(summary.discovery_error.as_deref().unwrap().contains("HTTP 404"));
        assert_eq!(summary.totals.total, 1);
        assert_eq!(summary.totals.failed, 1);
        assert!(recorder.updates.is_empty());
        assert_eq!(recorder.status_of(DISCOVERY_PLACEHOLDER), RepoStatus::Failed);
        assert!(recorder.board().done);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_owner_finishes_immediately() {
        let backend = Arc::new(ScriptedBackend::default());
        let engine = engine(StaticLister::names(&[]), backend, SyncConfig::default());
        let mut recorder = Recorder::default();
        let summary = engine.run("acme", &mut recorder).await;

        assert!(summary.is_success());
        assert_eq!(summary.totals.total, 0);
        assert!(recorder.board().done);
    }

    #[tokio::test(start_paused = true)]
    async fn every_repo_settles_exactly_once() {
        let backend = Arc::new(ScriptedBackend::with_delay(Duration::from_millis(10)));
        backend.script("b", vec![Err("connection reset"), Err("connection reset")]);
        backend.fail_always("c", "permission denied (publickey)");
        backend.fail_always("d", "network timeout");
        let config = SyncConfig {
            max_concurrency: 3,
            retry_delay: Duration::from_millis(200),
            ..SyncConfig::default()
        };
        let engine = engine(
            StaticLister::names(&["a", "b", "c", "d", "e"]),
            Arc::clone(&backend),
            config,
        );
        let mut recorder = Recorder::default();
        let summary = engine.run("acme", &mut recorder).await;

        let mut terminal: HashMap<&str, usize> = HashMap::new();
        for update in &recorder.updates {
            if update.status.is_terminal() {
                *terminal.entry(update.name.as_str()).or_default() += 1;
            }
        }
        assert_eq!(terminal.len(), 5);
        assert!(terminal.values().all(|count| *count == 1));
        assert_eq!(summary.totals.completed + summary.totals.failed, 5);
        assert_eq!(recorder.status_of("b"), RepoStatus::Completed);
        assert_eq!(recorder.status_of("c"), RepoStatus::Failed);
        assert_eq!(backend.attempts("b"), 3);
        assert_eq!(backend.attempts("c"), 1);
        assert_eq!(backend.attempts("d"), 3);

        for record in &recorder.board().records {
            let (start, end) = (record.started_at.unwrap(), record.finished_at.unwrap());
            assert!(start <= end);
            assert_eq!(record.error.is_some(), record.status == RepoStatus::Failed);
        }
    }
}
