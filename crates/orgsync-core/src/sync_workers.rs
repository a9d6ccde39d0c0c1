use crate::cancel::CancelSignal;
use crate::model::StatusUpdate;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, warn};

/// Sending half of the status channel handed to each worker.
#[derive(Clone, Debug)]
pub struct UpdateSink {
    tx: mpsc::Sender<StatusUpdate>,
    cancel: CancelSignal,
}

impl UpdateSink {
    /// Sends `update`, waiting for channel capacity. Once the run is cancelled
    /// the update is only delivered if it fits without waiting. Returns whether
    /// it was delivered.
    pub async fn emit(&self, update: StatusUpdate) -> bool {
        if self.cancel.is_cancelled() {
            return self.try_emit(update);
        }
        tokio::select! {
            biased;
            sent = self.tx.send(update) => sent.is_ok(),
            _ = self.cancel.cancelled() => false,
        }
    }

    /// Best-effort send that never waits.
    pub fn try_emit(&self, update: StatusUpdate) -> bool {
        self.tx.try_send(update).is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolReport {
    /// Workers that got a slot and ran their task.
    pub admitted: usize,
    /// Workers dropped by cancellation before running.
    pub abandoned: usize,
    pub panicked: usize,
}

/// Fans named work items out to tasks, at most `max_concurrency` at a time.
#[derive(Clone, Debug)]
pub struct WorkerPool {
    max_concurrency: usize,
    channel_capacity: usize,
    cancel: CancelSignal,
}

impl WorkerPool {
    pub fn new(max_concurrency: usize, channel_capacity: usize, cancel: CancelSignal) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
            channel_capacity: channel_capacity.max(1),
            cancel,
        }
    }

    /// Starts one worker per name. The returned receiver yields every update
    /// the tasks emit and closes once all workers have finished; the handle
    /// resolves at the same point.
    pub fn spawn<F, Fut>(
        &self,
        names: Vec<String>,
        task: F,
    ) -> (mpsc::Receiver<StatusUpdate>, JoinHandle<PoolReport>)
    where
        F: Fn(String, UpdateSink) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let task = Arc::new(task);
        let mut workers = JoinSet::new();

        for name in names {
            let semaphore = Arc::clone(&semaphore);
            let task = Arc::clone(&task);
            let cancel = self.cancel.clone();
            let sink = UpdateSink {
                tx: tx.clone(),
                cancel: cancel.clone(),
            };
            workers.spawn(async move {
                let permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    permit = semaphore.acquire_owned() => permit.ok(),
                };
                let Some(_permit) = permit else {
                    debug!(repo = %name, "worker abandoned before admission");
                    return false;
                };
                if cancel.is_cancelled() {
                    return false;
                }
                (*task)(name, sink).await;
                true
            });
        }
        drop(tx);

        let handle = tokio::spawn(async move {
            let mut report = PoolReport::default();
            while let Some(joined) = workers.join_next().await {
                match joined {
                    Ok(true) => report.admitted += 1,
                    Ok(false) => report.abandoned += 1,
                    Err(err) => {
                        warn!(error = %err, "sync worker failed");
                        report.panicked += 1;
                    }
                }
            }
            report
        });
        (rx, handle)
    }
}
