use anyhow::{Context, bail};
use std::ffi::OsStr;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

const MAX_STDERR_CHARS: usize = 400;

/// Runs an external program to completion and returns its stdout.
///
/// A non-zero exit becomes an error carrying the exit status and the captured
/// stderr. The child is killed if the returned future is dropped, which is how
/// callers enforce timeouts.
pub async fn run_command<I, S>(program: &str, args: I) -> anyhow::Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    debug!(command = ?command.as_std(), "running external command");

    let output = command
        .output()
        .await
        .with_context(|| format!("spawn {program}"))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "{program} exited with {}: {}",
            output.status,
            summarize_stderr(&stderr)
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn summarize_stderr(stderr: &str) -> String {
    let joined = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("; ");
    if joined.is_empty() {
        return "no error output".to_string();
    }
    if joined.chars().count() > MAX_STDERR_CHARS {
        let truncated: String = joined.chars().take(MAX_STDERR_CHARS).collect();
        return format!("{truncated}...");
    }
    joined
}
