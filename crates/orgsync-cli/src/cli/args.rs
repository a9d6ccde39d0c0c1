use super::*;

#[derive(Parser, Debug)]
#[command(
    name = "orgsync",
    author,
    version,
    about = "Clone or fetch every repository owned by a GitHub organization or user"
)]
pub(super) struct Cli {
    #[arg(value_name = "OWNER", help = "Organization or user to sync")]
    pub(super) owner: String,
    #[arg(long, default_value = ".", help = "Directory holding the local copies")]
    pub(super) root: PathBuf,
    #[arg(
        long,
        short = 'j',
        default_value_t = DEFAULT_MAX_CONCURRENCY,
        help = "Maximum concurrent clone/fetch operations"
    )]
    pub(super) jobs: usize,
    #[arg(
        long,
        default_value_t = DEFAULT_TIMEOUT.as_secs(),
        help = "Timeout per clone/fetch in seconds"
    )]
    pub(super) timeout_secs: u64,
    #[arg(
        long,
        default_value_t = DEFAULT_RETRY_ATTEMPTS,
        help = "Retries after a failed attempt"
    )]
    pub(super) retries: u32,
    #[arg(
        long,
        default_value_t = DEFAULT_RETRY_DELAY.as_millis() as u64,
        help = "Delay between attempts in milliseconds"
    )]
    pub(super) retry_delay_ms: u64,
    #[arg(long, value_enum, default_value_t = OutputMode::Auto)]
    pub(super) output: OutputMode,
    #[arg(long, help = "Simulate a remote owner instead of calling gh/git")]
    pub(super) test: bool,
    #[arg(
        long,
        default_value_t = DEFAULT_REPO_COUNT,
        help = "Number of simulated repositories"
    )]
    pub(super) test_repos: usize,
    #[arg(
        long,
        default_value_t = DEFAULT_FAIL_RATE,
        value_parser = parse_fail_rate,
        help = "Chance that a simulated attempt fails (0.0-1.0)"
    )]
    pub(super) test_fail_rate: f64,
    #[arg(long, help = "Seed for simulated latency and failures")]
    pub(super) test_seed: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(super) enum OutputMode {
    /// Dashboard on a terminal, plain lines otherwise.
    Auto,
    Tui,
    Plain,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum RenderMode {
    Dashboard,
    Plain,
    Json,
}

impl OutputMode {
    pub(super) fn resolve(self, stdout_is_tty: bool) -> RenderMode {
        match self {
            OutputMode::Auto if stdout_is_tty => RenderMode::Dashboard,
            OutputMode::Auto => RenderMode::Plain,
            OutputMode::Tui => RenderMode::Dashboard,
            OutputMode::Plain => RenderMode::Plain,
            OutputMode::Json => RenderMode::Json,
        }
    }
}

impl Cli {
    pub(super) fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            max_concurrency: self.jobs,
            timeout: Duration::from_secs(self.timeout_secs),
            retry_attempts: self.retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            ..SyncConfig::default()
        }
    }

    pub(super) fn repo_source(&self) -> RepoSource {
        if !self.test {
            return RepoSource::GhCli;
        }
        RepoSource::Simulated(SimulationSettings {
            repo_count: self.test_repos,
            fail_rate: self.test_fail_rate,
            seed: self.test_seed.unwrap_or_else(clock_seed),
            ..SimulationSettings::default()
        })
    }
}

fn parse_fail_rate(value: &str) -> Result<f64, String> {
    let rate: f64 = value
        .parse()
        .map_err(|_| format!("`{value}` is not a number"))?;
    if !(0.0..=1.0).contains(&rate) {
        return Err(format!("fail rate must be between 0.0 and 1.0, got {rate}"));
    }
    Ok(rate)
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or(0)
}
