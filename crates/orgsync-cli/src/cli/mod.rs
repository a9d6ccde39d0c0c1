use crate::logging::{LogBuffer, LogLayer};
use crate::render::{JsonObserver, PlainObserver, summary_line};
use crate::tui;
use anyhow::Context;
use clap::{Parser, ValueEnum};
use orgsync_core::cancel::CancelSignal;
use orgsync_core::config::{
    DEFAULT_MAX_CONCURRENCY, DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY, DEFAULT_TIMEOUT,
    SyncConfig,
};
use orgsync_core::lockfile::RunLock;
use orgsync_core::sync_engine::SyncEngine;
use orgsync_core::sync_status::SnapshotPublisher;
use orgsync_providers::RepoSource;
use orgsync_providers::simulated::{DEFAULT_FAIL_RATE, DEFAULT_REPO_COUNT, SimulationSettings};
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

mod app;
mod args;

use args::*;

pub async fn run() -> ExitCode {
    app::run().await
}
