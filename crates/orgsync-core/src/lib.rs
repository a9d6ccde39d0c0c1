pub mod cancel;
pub mod config;
pub mod error;
pub mod git_sync;
pub mod lockfile;
pub mod model;
pub mod paths;
pub mod process;
pub mod provider;
pub mod sync_coordinator;
pub mod sync_engine;
pub mod sync_executor;
pub mod sync_retry;
pub mod sync_status;
pub mod sync_workers;

#[cfg(test)]
pub(crate) mod test_support;
