use super::*;

pub(in crate::tui) fn status_label(status: RepoStatus) -> &'static str {
    match status {
        RepoStatus::Pending => "Pending",
        RepoStatus::Cloning => "Cloning",
        RepoStatus::Fetching => "Fetching",
        RepoStatus::Completed => "Completed",
        RepoStatus::Failed => "Failed",
    }
}

pub(in crate::tui) fn status_style(status: RepoStatus) -> Style {
    match status {
        RepoStatus::Pending => Style::default().fg(Color::DarkGray),
        RepoStatus::Cloning | RepoStatus::Fetching => Style::default().fg(Color::Yellow),
        RepoStatus::Completed => Style::default().fg(Color::Green),
        RepoStatus::Failed => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
    }
}

/// `-` before the first attempt, `<1s` under a second, otherwise whole
/// seconds such as `3s` or `1m5s`.
pub(in crate::tui) fn format_duration(record: &RepoRecord, now: OffsetDateTime) -> String {
    match record.elapsed(now) {
        None => "-".to_string(),
        Some(elapsed) => format_elapsed(elapsed),
    }
}

pub(in crate::tui) fn format_elapsed(elapsed: time::Duration) -> String {
    let seconds = elapsed.whole_seconds();
    if seconds < 1 {
        return "<1s".to_string();
    }
    let (hours, minutes, seconds) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}

pub(in crate::tui) fn footer_text(finished: bool) -> &'static str {
    if finished {
        "q: quit | c: toggle completed"
    } else {
        "q/Ctrl+C: cancel | c: toggle completed"
    }
}
