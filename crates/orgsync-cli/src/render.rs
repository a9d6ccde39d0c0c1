use orgsync_core::model::{RepoStatus, StatusUpdate};
use orgsync_core::sync_engine::RunSummary;
use orgsync_core::sync_status::{RunTotals, StatusBoard, StatusObserver};
use serde::Serialize;
use std::io::Write;

/// Longest error detail shown inline before truncation.
pub const MAX_INLINE_ERROR: usize = 120;

pub fn summary_line(totals: &RunTotals) -> String {
    let mut line = format!(
        "Sync completed: {}/{} successful",
        totals.completed, totals.total
    );
    if totals.failed > 0 {
        line.push_str(&format!(", {} failed", totals.failed));
    }
    if totals.pending + totals.active > 0 {
        line.push_str(&format!(", {} not finished", totals.pending + totals.active));
    }
    line
}

pub fn truncate_error(message: &str, max_chars: usize) -> String {
    let flat = message.replace('\n', " ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let mut truncated: String = flat.chars().take(max_chars.saturating_sub(3)).collect();
    truncated.push_str("...");
    truncated
}

/// Line-oriented output for non-interactive terminals and logs.
pub struct PlainObserver<W> {
    out: W,
}

impl<W: Write + Send> PlainObserver<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> StatusObserver for PlainObserver<W> {
    fn on_start(&mut self, board: &StatusBoard) {
        let _ = match board.discovery_error() {
            Some(error) => writeln!(
                self.out,
                "Error fetching repos for {}: {}",
                board.owner(),
                error
            ),
            None => writeln!(
                self.out,
                "Syncing {} repositories for {}",
                board.total(),
                board.owner()
            ),
        };
    }

    fn on_update(&mut self, update: &StatusUpdate, board: &StatusBoard) {
        let mut line = format!(
            "[{}/{}] {} {}",
            board.count_settled(),
            board.total(),
            update.name,
            update.status
        );
        if update.retries > 0 {
            line.push_str(&format!(" (retry {})", update.retries));
        }
        if let Some(error) = &update.error {
            line.push_str(&format!(": {}", truncate_error(error, MAX_INLINE_ERROR)));
        }
        let _ = writeln!(self.out, "{line}");
    }

    fn on_finish(&mut self, board: &StatusBoard) {
        let _ = writeln!(self.out, "{}", summary_line(&board.totals()));
        if board.discovery_error().is_some() {
            return;
        }
        for record in board.records() {
            if record.status == RepoStatus::Failed {
                let error = record.error.as_deref().unwrap_or("unknown error");
                let _ = writeln!(self.out, "  {}: {}", record.name, error);
            }
        }
        let _ = self.out.flush();
    }
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum JsonEvent<'a> {
    Update(&'a StatusUpdate),
    Summary(&'a RunSummary),
}

/// One JSON object per line: every applied update, then a summary.
pub struct JsonObserver<W> {
    out: W,
}

impl<W: Write + Send> JsonObserver<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn write_summary(&mut self, summary: &RunSummary) -> anyhow::Result<()> {
        self.write_event(&JsonEvent::Summary(summary))
    }

    fn write_event(&mut self, event: &JsonEvent<'_>) -> anyhow::Result<()> {
        serde_json::to_writer(&mut self.out, event)?;
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> StatusObserver for JsonObserver<W> {
    fn on_update(&mut self, update: &StatusUpdate, _board: &StatusBoard) {
        if let Err(err) = self.write_event(&JsonEvent::Update(update)) {
            tracing::warn!(error = %err, "failed to write json update");
        }
    }
}
