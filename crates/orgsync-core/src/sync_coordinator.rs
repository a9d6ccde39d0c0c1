use crate::cancel::CancelSignal;
use crate::config::SyncConfig;
use crate::model::StatusUpdate;
use crate::sync_executor::SyncExecutor;
use crate::sync_retry::RetryPolicy;
use crate::sync_workers::{PoolReport, UpdateSink, WorkerPool};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Runs retry-wrapped syncs for a set of repositories on a bounded pool and
/// reports every state change on a single channel.
pub struct Coordinator {
    pool: WorkerPool,
    executor: Arc<SyncExecutor>,
    retry: RetryPolicy,
}

impl Coordinator {
    pub fn new(config: &SyncConfig, executor: SyncExecutor, cancel: CancelSignal) -> Self {
        Self {
            pool: WorkerPool::new(
                config.max_concurrency,
                config.channel_capacity,
                cancel.clone(),
            ),
            executor: Arc::new(executor),
            retry: RetryPolicy::new(config, cancel),
        }
    }

    pub fn run(&self, names: Vec<String>) -> (mpsc::Receiver<StatusUpdate>, JoinHandle<PoolReport>) {
        let executor = Arc::clone(&self.executor);
        let retry = self.retry.clone();
        self.pool.spawn(names, move |name, sink| {
            let executor = Arc::clone(&executor);
            let retry = retry.clone();
            async move { sync_one(&executor, &retry, name, sink).await }
        })
    }
}

async fn sync_one(executor: &SyncExecutor, retry: &RetryPolicy, name: String, sink: UpdateSink) {
    let operation = executor.plan(&name).await;
    if !sink.emit(StatusUpdate::active(&name, operation, 0)).await {
        debug!(repo = %name, "run cancelled before sync started");
        return;
    }

    let report = retry
        .run(
            &name,
            |_| executor.execute(&name, operation),
            |retries, _| {
                if !sink.is_cancelled() {
                    sink.try_emit(StatusUpdate::active(&name, operation, retries));
                }
            },
        )
        .await;

    let update = match &report.result {
        Ok(()) => {
            info!(repo = %name, operation = %operation, retries = report.retries, "repo synced");
            StatusUpdate::completed(&name, report.retries)
        }
        Err(err) if err.is_cancelled() => {
            debug!(repo = %name, "sync abandoned after cancellation");
            return;
        }
        Err(err) => {
            warn!(repo = %name, retries = report.retries, error = %err, "repo sync failed");
            StatusUpdate::failed(&name, err, report.retries)
        }
    };
    if !sink.emit(update).await {
        debug!(repo = %name, "final status dropped during shutdown");
    }
}
