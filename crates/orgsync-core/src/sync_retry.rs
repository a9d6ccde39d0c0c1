use crate::cancel::CancelSignal;
use crate::config::SyncConfig;
use crate::error::SyncError;
use backon::{ConstantBuilder, Retryable};
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Bounded, cancellation-aware retries around a single sync attempt.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    retry_attempts: u32,
    retry_delay: Duration,
    cancel: CancelSignal,
}

#[derive(Debug)]
pub struct RetryReport {
    pub result: Result<(), SyncError>,
    /// Attempts made beyond the first.
    pub retries: u32,
}

impl RetryPolicy {
    pub fn new(config: &SyncConfig, cancel: CancelSignal) -> Self {
        Self {
            retry_attempts: config.retry_attempts,
            retry_delay: config.retry_delay,
            cancel,
        }
    }

    fn backoff(&self) -> ConstantBuilder {
        ConstantBuilder::default()
            .with_delay(self.retry_delay)
            .with_max_times(self.retry_attempts as usize)
    }

    /// Runs `attempt` until it succeeds, fails with a non-retryable error, or
    /// the retry budget is spent. `on_retry` is told about every retry before
    /// the delay starts. Once the run is cancelled no further attempt starts.
    pub async fn run<F, Fut, R>(&self, repo: &str, mut attempt: F, mut on_retry: R) -> RetryReport
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<(), SyncError>>,
        R: FnMut(u32, &SyncError),
    {
        let started = AtomicU32::new(0);
        let sleeper_cancel = self.cancel.clone();

        let result = (|| {
            let number = started.load(Ordering::SeqCst);
            let work = if number > 0 && self.cancel.is_cancelled() {
                None
            } else {
                started.fetch_add(1, Ordering::SeqCst);
                Some(attempt(number))
            };
            let repo = repo.to_string();
            async move {
                match work {
                    Some(work) => work.await,
                    None => Err(SyncError::Cancelled { repo }),
                }
            }
        })
        .retry(self.backoff())
        .sleep(move |delay| cancellable_sleep(sleeper_cancel.clone(), delay))
        .when(|err: &SyncError| err.is_retryable() && !self.cancel.is_cancelled())
        .notify(|err: &SyncError, delay: Duration| {
            let retries = started.load(Ordering::SeqCst);
            warn!(
                repo = %repo,
                attempt = retries + 1,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "retrying sync"
            );
            on_retry(retries, err);
        })
        .await;

        let retries = started.load(Ordering::SeqCst).saturating_sub(1);
        let result = match result {
            Err(err)
                if err.is_retryable()
                    && self.cancel.is_cancelled()
                    && retries < self.retry_attempts =>
            {
                debug!(repo = %repo, retries, error = %err, "attempt failed after cancellation");
                Err(SyncError::Cancelled {
                    repo: repo.to_string(),
                })
            }
            Err(err) if err.is_retryable() => {
                warn!(repo = %repo, retries, error = %err, "retry budget exhausted");
                Err(err)
            }
            Err(err) => {
                if !err.is_cancelled() {
                    debug!(repo = %repo, retries, error = %err, "error is not retryable");
                }
                Err(err)
            }
            Ok(()) => Ok(()),
        };
        RetryReport { result, retries }
    }
}

/// Retry delay that ends early when the run is cancelled.
async fn cancellable_sleep(cancel: CancelSignal, delay: Duration) {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {}
        _ = tokio::time::sleep(delay) => {}
    }
}
