//! UI rendering for the TUI.

use chrono::{DateTime, Local, Utc};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
};

use crate::core::{JobStatus, ScanJob};

use super::app::{TuiApp, View};

/// Main render function - dispatches to view-specific renderers.
pub fn render(frame: &mut Frame, app: &TuiApp) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Content
            Constraint::Length(3), // Footer/help
        ])
        .split(frame.area());

    render_header(frame, app, chunks[0]);

    match &app.view {
        View::Dashboard { selected } => render_dashboard(frame, app, chunks[1], *selected),
        View::AllScans { selected } => render_all_scans(frame, app, chunks[1], *selected),
        View::Detail { scroll, .. } => render_detail(frame, app, chunks[1], *scroll),
    }

    render_footer(frame, app, chunks[2]);
}

fn render_header(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let title = format!(
        "SCANWATCH  {}  scans: {}  pending: {}",
        app.service,
        app.jobs.len(),
        app.pending_count()
    );

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    frame.render_widget(block, area);
}

fn render_dashboard(frame: &mut Frame, app: &TuiApp, area: Rect, selected: usize) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Domain input
            Constraint::Min(0),    // Tracked scans
        ])
        .split(area);

    let input_style = if app.editing {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let input = Paragraph::new(app.input.as_str()).style(input_style).block(
        Block::default()
            .title("Domain")
            .borders(Borders::ALL)
            .border_style(input_style),
    );
    frame.render_widget(input, chunks[0]);

    if app.editing {
        frame.set_cursor_position((
            chunks[0].x + app.input.chars().count() as u16 + 1,
            chunks[0].y + 1,
        ));
    }

    let block = Block::default()
        .title("Scans")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    if app.jobs.is_empty() {
        let text = Paragraph::new("  No scans yet. Type a domain and press Enter.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(text, chunks[1]);
        return;
    }

    let now = Utc::now();
    let items: Vec<ListItem> = app
        .jobs
        .iter()
        .enumerate()
        .map(|(i, job)| {
            let is_selected = !app.editing && i == selected;
            let timing = match job.completed_at {
                Some(done) => format!(
                    "done {} ({})",
                    local_time(done),
                    format_duration(seconds_between(job.created_at, done))
                ),
                None => format!("running {}", format_duration(seconds_between(job.created_at, now))),
            };

            let line = Line::from(vec![
                Span::raw(if is_selected { "> " } else { "  " }),
                status_icon(job.status),
                Span::raw(format!(
                    "  {:<32}  {:<9}  {}  {}",
                    job.domain,
                    job.status,
                    local_time(job.created_at),
                    timing
                )),
            ]);

            ListItem::new(line).style(selected_style(is_selected))
        })
        .collect();

    let list = List::new(items).block(block);
    frame.render_widget(list, chunks[1]);
}

fn render_all_scans(frame: &mut Frame, app: &TuiApp, area: Rect, selected: usize) {
    let block = Block::default()
        .title("All Scans")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    if app.jobs.is_empty() {
        let text = Paragraph::new("  No scans found")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(text, area);
        return;
    }

    let items: Vec<ListItem> = app
        .jobs
        .iter()
        .enumerate()
        .map(|(i, job)| {
            let is_selected = i == selected;
            let line = Line::from(vec![
                Span::raw("  "),
                status_icon(job.status),
                Span::raw(format!("  {}", all_scans_line(job))),
            ]);
            ListItem::new(line).style(selected_style(is_selected))
        })
        .collect();

    let list = List::new(items).block(block);
    frame.render_widget(list, area);
}

fn render_detail(frame: &mut Frame, app: &TuiApp, area: Rect, scroll: u16) {
    let block = Block::default()
        .title("Scan Details")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let Some(job) = app.selected_job() else {
        let text = Paragraph::new("  Scan is no longer tracked")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(text, area);
        return;
    };

    let mut lines = vec![
        field_line("Scan ID:   ", job.id.clone()),
        field_line("Domain:    ", job.domain.clone()),
        field_line("Status:    ", job.status.to_string()),
        field_line("Started:   ", local_time(job.created_at)),
        field_line(
            "Completed: ",
            job.completed_at.map(local_time).unwrap_or_else(|| "-".to_string()),
        ),
    ];
    if let Some(summary) = &job.summary {
        lines.push(field_line("Summary:   ", summary.clone()));
    }

    if job.is_terminal() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "  Result",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from("  ─────────────────────────────────────────"));

        let pretty = match &job.result {
            Some(result) => serde_json::to_string_pretty(result).unwrap_or_else(|_| result.to_string()),
            None => "-".to_string(),
        };
        for text in pretty.lines() {
            lines.push(Line::from(format!("  {}", text)));
        }
    }

    let paragraph = Paragraph::new(lines).block(block).scroll((scroll, 0));
    frame.render_widget(paragraph, area);
}

fn render_footer(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let help_text = match &app.view {
        View::Dashboard { .. } if app.editing => "[Enter] Scan  [Tab/Esc] Browse  [Ctrl-C] Quit",
        View::Dashboard { .. } => {
            "[↑↓] Navigate  [Enter] Details  [i] Type  [a] All  [r] Refresh  [e] Export  [q] Quit"
        }
        View::AllScans { .. } => "[↑↓] Navigate  [Enter] Details  [e] Export  [Esc] Back  [q] Quit",
        View::Detail { .. } => "[↑↓] Scroll  [Esc] Back  [q] Quit",
    };

    let mut spans = vec![Span::raw(format!("  {}", help_text))];

    if let Some(error) = &app.error {
        spans.push(Span::styled(
            format!("  Error: {}", error),
            Style::default().fg(Color::Red),
        ));
    } else if let Some(notice) = &app.notice {
        spans.push(Span::styled(
            format!("  {}", notice),
            Style::default().fg(Color::Green),
        ));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let paragraph = Paragraph::new(Line::from(spans)).block(block);
    frame.render_widget(paragraph, area);
}

fn field_line(label: &'static str, value: String) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {}", label), Style::default().fg(Color::Cyan)),
        Span::raw(value),
    ])
}

fn status_icon(status: JobStatus) -> Span<'static> {
    match status {
        JobStatus::Completed => Span::styled("✓", Style::default().fg(Color::Green)),
        JobStatus::Error => Span::styled("✗", Style::default().fg(Color::Red)),
        JobStatus::Stalled => Span::styled("!", Style::default().fg(Color::Magenta)),
        JobStatus::Pending => Span::styled("•", Style::default().fg(Color::Yellow)),
    }
}

fn selected_style(is_selected: bool) -> Style {
    if is_selected {
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    }
}

fn local_time(time: DateTime<Utc>) -> String {
    time.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    end.signed_duration_since(start).num_seconds().max(0) as u64
}

fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;

    if hours > 0 {
        format!("{}h {}m", hours, mins)
    } else if mins > 0 {
        format!("{}m {}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}

fn all_scans_line(job: &ScanJob) -> String {
    format!("{} | {} | {}", job.domain, job.status, job.created_at.to_rfc3339())
}
