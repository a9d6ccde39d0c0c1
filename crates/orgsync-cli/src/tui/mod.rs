use crate::logging::LogBuffer;
use crate::render::{MAX_INLINE_ERROR, summary_line, truncate_error};
use anyhow::Context;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use orgsync_core::cancel::CancelSignal;
use orgsync_core::model::{RepoRecord, RepoStatus};
use orgsync_core::sync_status::BoardSnapshot;
use ratatui::{
    Terminal,
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, Paragraph, Wrap},
};
use std::io;
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::debug;

mod draw;
mod theme;

use theme::*;

const TICK_RATE: Duration = Duration::from_millis(200);
const LOG_PANEL_HEIGHT: u16 = 7;
const LOG_PANEL_BORDER_HEIGHT: u16 = 2;
const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Runs the dashboard on the current thread until the user quits. Returns the
/// last snapshot seen.
pub fn run_dashboard(
    snapshots: watch::Receiver<BoardSnapshot>,
    log_buffer: LogBuffer,
    cancel: CancelSignal,
) -> anyhow::Result<BoardSnapshot> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    if let Err(err) = execute!(stdout, EnterAlternateScreen) {
        disable_raw_mode().ok();
        return Err(err).context("enter alternate screen");
    }
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = match Terminal::new(backend) {
        Ok(terminal) => terminal,
        Err(err) => {
            disable_raw_mode().ok();
            execute!(io::stdout(), LeaveAlternateScreen).ok();
            return Err(err).context("create terminal");
        }
    };

    let mut dashboard = Dashboard::new(log_buffer);
    let result = run_loop(&mut terminal, &mut dashboard, snapshots, &cancel);

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();

    result.map(|()| dashboard.snapshot)
}

fn run_loop<B: Backend>(
    terminal: &mut Terminal<B>,
    dashboard: &mut Dashboard,
    mut snapshots: watch::Receiver<BoardSnapshot>,
    cancel: &CancelSignal,
) -> anyhow::Result<()> {
    let mut last_tick = Instant::now();
    debug!(tick_rate_ms = TICK_RATE.as_millis() as u64, "dashboard started");

    loop {
        dashboard.refresh(&mut snapshots);
        terminal
            .draw(|frame| dashboard.draw(frame))
            .context("draw dashboard")?;

        let timeout = TICK_RATE
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout).context("poll terminal events")?
            && let Event::Key(key) = event::read().context("read terminal event")?
            && dashboard.handle_key(key, cancel)
        {
            return Ok(());
        }

        if last_tick.elapsed() >= TICK_RATE {
            dashboard.tick();
            last_tick = Instant::now();
        }
    }
}

pub(crate) struct Dashboard {
    snapshot: BoardSnapshot,
    show_completed: bool,
    spinner: usize,
    log_buffer: LogBuffer,
}

impl Dashboard {
    pub(crate) fn new(log_buffer: LogBuffer) -> Self {
        Self {
            snapshot: BoardSnapshot::default(),
            show_completed: false,
            spinner: 0,
            log_buffer,
        }
    }

    fn refresh(&mut self, snapshots: &mut watch::Receiver<BoardSnapshot>) {
        // A closed channel still holds the final snapshot.
        if snapshots.has_changed().unwrap_or(true) {
            self.snapshot = snapshots.borrow_and_update().clone();
        }
    }

    fn tick(&mut self) {
        self.spinner = (self.spinner + 1) % SPINNER_FRAMES.len();
    }

    /// Whether the run has nothing left to show progress for.
    fn is_finished(&self) -> bool {
        self.snapshot.finished || self.snapshot.done
    }

    /// Returns true when the dashboard should close.
    fn handle_key(&mut self, key: KeyEvent, cancel: &CancelSignal) -> bool {
        if key.kind != KeyEventKind::Press {
            return false;
        }
        let quit = match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => true,
            KeyCode::Char('q') | KeyCode::Esc => true,
            KeyCode::Char('c') => {
                self.show_completed = !self.show_completed;
                false
            }
            _ => false,
        };
        if quit && !self.is_finished() {
            cancel.cancel();
        }
        quit
    }

    fn visible_records(&self) -> Vec<&RepoRecord> {
        self.snapshot
            .records
            .iter()
            .filter(|record| self.show_completed || record.status != RepoStatus::Completed)
            .collect()
    }
}
