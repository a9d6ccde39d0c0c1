use super::*;

const LOG_BUFFER_ENTRIES: usize = 200;
/// How long to wait for in-flight operations after the dashboard closes.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

pub(super) async fn run() -> ExitCode {
    let cli = Cli::parse();
    let mode = cli.output.resolve(io::stdout().is_terminal());
    let log_buffer = init_logging(mode);

    match run_sync(cli, mode, log_buffer).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!(error = %format!("{err:#}"), "orgsync failed");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

pub(super) fn default_filter(mode: RenderMode) -> &'static str {
    match mode {
        RenderMode::Dashboard => "warn",
        RenderMode::Plain | RenderMode::Json => "info",
    }
}

fn init_logging(mode: RenderMode) -> LogBuffer {
    let log_buffer = LogBuffer::new(LOG_BUFFER_ENTRIES);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(mode)));
    let registry = tracing_subscriber::registry().with(filter);
    match mode {
        RenderMode::Dashboard => registry
            .with(LogLayer::new(log_buffer.clone()))
            .init(),
        RenderMode::Plain | RenderMode::Json => registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init(),
    }
    log_buffer
}

/// Returns whether the run should exit successfully.
pub(super) async fn run_sync(
    cli: Cli,
    mode: RenderMode,
    log_buffer: LogBuffer,
) -> anyhow::Result<bool> {
    let config = cli.sync_config();
    let source = cli.repo_source();
    let _lock = RunLock::try_acquire(&cli.root)?.with_context(|| {
        format!(
            "another orgsync run is already using {}",
            cli.root.display()
        )
    })?;

    let parts = source.build();
    let engine = SyncEngine::new(config, parts.lister, parts.backend, cli.root.clone())?;
    spawn_interrupt_handler(engine.cancel_signal());
    if let RepoSource::Simulated(settings) = &source {
        info!(
            repos = settings.repo_count,
            fail_rate = settings.fail_rate,
            seed = settings.seed,
            "running against simulated owner"
        );
    }

    match mode {
        RenderMode::Dashboard => run_dashboard(Arc::new(engine), cli.owner, log_buffer).await,
        RenderMode::Plain => {
            let mut observer = PlainObserver::new(io::stdout());
            let summary = engine.run(&cli.owner, &mut observer).await;
            Ok(summary.is_success())
        }
        RenderMode::Json => {
            let mut observer = JsonObserver::new(io::stdout());
            let summary = engine.run(&cli.owner, &mut observer).await;
            observer.write_summary(&summary)?;
            Ok(summary.is_success())
        }
    }
}

async fn run_dashboard(
    engine: Arc<SyncEngine>,
    owner: String,
    log_buffer: LogBuffer,
) -> anyhow::Result<bool> {
    let cancel = engine.cancel_signal();
    let (mut publisher, snapshots) = SnapshotPublisher::channel();
    let mut engine_task = tokio::spawn(async move { engine.run(&owner, &mut publisher).await });

    let ui_cancel = cancel.clone();
    let dashboard =
        tokio::task::spawn_blocking(move || tui::run_dashboard(snapshots, log_buffer, ui_cancel))
            .await
            .context("join dashboard thread")?;
    let last = match dashboard {
        Ok(last) => last,
        Err(err) => {
            cancel.cancel();
            return Err(err);
        }
    };

    match tokio::time::timeout(SHUTDOWN_GRACE, &mut engine_task).await {
        Ok(joined) => {
            let summary = joined.context("join sync engine")?;
            println!("{}", summary_line(&summary.totals));
            if let Some(error) = &summary.discovery_error {
                eprintln!("error fetching repos: {error}");
            }
            Ok(summary.is_success())
        }
        Err(_) => {
            warn!("in-flight operations still running at exit; abandoning them");
            engine_task.abort();
            println!("{}", summary_line(&last.totals));
            Ok(last.discovery_error.is_none())
        }
    }
}

fn spawn_interrupt_handler(cancel: CancelSignal) {
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl+C");
            return;
        }
        warn!("interrupt received, letting in-flight operations finish");
        cancel.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
}
