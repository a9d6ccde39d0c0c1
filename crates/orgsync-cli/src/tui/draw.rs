use super::*;

impl Dashboard {
    pub(in crate::tui) fn draw(&self, frame: &mut ratatui::Frame) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(LOG_PANEL_HEIGHT),
                Constraint::Length(3),
            ])
            .split(frame.area());

        let owner = if self.snapshot.owner.is_empty() {
            "..."
        } else {
            self.snapshot.owner.as_str()
        };
        let header = Paragraph::new(format!("Organization: {owner}"))
            .block(Block::default().borders(Borders::ALL).title("OrgSync"));
        frame.render_widget(header, layout[0]);

        self.draw_progress(frame, layout[1]);
        if self.is_finished() {
            self.draw_summary(frame, layout[2]);
        } else {
            self.draw_repos(frame, layout[2]);
        }
        self.draw_log_panel(frame, layout[3]);

        let footer = Paragraph::new(footer_text(self.is_finished()))
            .block(Block::default().borders(Borders::ALL).title("Help"));
        frame.render_widget(footer, layout[4]);
    }

    fn draw_progress(&self, frame: &mut ratatui::Frame, area: Rect) {
        let totals = &self.snapshot.totals;
        let label = format!(
            "{}/{} settled ({} active, {} failed)",
            totals.settled(),
            totals.total,
            totals.active,
            totals.failed
        );
        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL).title("Progress"))
            .gauge_style(Style::default().fg(Color::Green))
            .ratio(self.snapshot.progress().clamp(0.0, 1.0))
            .label(label);
        frame.render_widget(gauge, area);
    }

    fn draw_repos(&self, frame: &mut ratatui::Frame, area: Rect) {
        let now = OffsetDateTime::now_utc();
        let records = self.visible_records();
        let name_width = records
            .iter()
            .map(|record| record.name.chars().count())
            .max()
            .unwrap_or(0)
            .min(40);

        let items: Vec<ListItem> = if self.snapshot.records.is_empty() {
            vec![ListItem::new("Fetching repository list...")]
        } else {
            records
                .iter()
                .map(|record| repo_line(record, name_width, now))
                .map(ListItem::new)
                .collect()
        };
        let title = format!(
            "{} Syncing repositories{}",
            SPINNER_FRAMES[self.spinner],
            if self.show_completed {
                ""
            } else {
                " (completed hidden)"
            }
        );
        let list = List::new(items).block(Block::default().borders(Borders::ALL).title(title));
        frame.render_widget(list, area);
    }

    fn draw_summary(&self, frame: &mut ratatui::Frame, area: Rect) {
        let mut lines = vec![Line::from(Span::styled(
            summary_line(&self.snapshot.totals),
            Style::default().add_modifier(Modifier::BOLD),
        ))];
        if let Some(error) = &self.snapshot.discovery_error {
            lines.push(Line::from(Span::styled(
                format!("Error fetching repos: {error}"),
                status_style(RepoStatus::Failed),
            )));
        } else {
            let now = OffsetDateTime::now_utc();
            let shown = self
                .snapshot
                .records
                .iter()
                .filter(|record| self.show_completed || record.status != RepoStatus::Completed);
            for record in shown {
                lines.push(repo_line(record, record.name.chars().count(), now));
            }
        }
        let widget = Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Summary"));
        frame.render_widget(widget, area);
    }

    fn draw_log_panel(&self, frame: &mut ratatui::Frame, area: Rect) {
        let max_lines = area.height.saturating_sub(LOG_PANEL_BORDER_HEIGHT) as usize;
        if max_lines == 0 {
            return;
        }
        let entries = self.log_buffer.recent(max_lines);
        let lines: Vec<Line> = if entries.is_empty() {
            vec![Line::from(Span::raw("No log messages yet."))]
        } else {
            entries
                .iter()
                .map(|entry| Line::from(Span::raw(entry.format_compact())))
                .collect()
        };
        let widget = Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Logs"));
        frame.render_widget(widget, area);
    }
}

fn repo_line(record: &RepoRecord, name_width: usize, now: OffsetDateTime) -> Line<'static> {
    let mut spans = vec![
        Span::raw(format!("{:<name_width$}  ", record.name)),
        Span::styled(
            format!("{:<9}", status_label(record.status)),
            status_style(record.status),
        ),
        Span::raw(format!(" {:>7}", format_duration(record, now))),
    ];
    if record.retry_count > 0 {
        spans.push(Span::raw(format!("  retry {}", record.retry_count)));
    }
    if let Some(error) = &record.error {
        spans.push(Span::styled(
            format!("  {}", truncate_error(error, MAX_INLINE_ERROR)),
            status_style(RepoStatus::Failed),
        ));
    }
    Line::from(spans)
}
