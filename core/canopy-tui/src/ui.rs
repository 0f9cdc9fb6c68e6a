//! Rendering for the session browser. One frame: a title bar, the session
//! table, and a status/help line.

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table};
use ratatui::Frame;

use crate::app::App;
use canopy_core::{SessionKind, SessionStatus};
use chrono::Utc;

pub fn draw(frame: &mut Frame, app: &App) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(3), Constraint::Length(1)])
        .split(frame.area());

    draw_title(frame, layout[0], app);
    draw_table(frame, layout[1], app);
    draw_footer(frame, layout[2], app);
}

fn draw_title(frame: &mut Frame, area: Rect, app: &App) {
    let hidden = if app.hide_completed { " (active only)" } else { "" };
    let title = format!(" canopy-browse{hidden} — {} session(s) ", app.visible_sessions().len());
    frame.render_widget(Paragraph::new(title).style(Style::default().add_modifier(Modifier::BOLD)), area);
}

fn draw_table(frame: &mut Frame, area: Rect, app: &App) {
    let now = Utc::now();
    let header = Row::new(vec!["ID", "STATUS", "KIND", "REPO / PLAN", "AGE"]).style(Style::default().add_modifier(Modifier::BOLD));

    let rows: Vec<Row> = app
        .visible_sessions()
        .iter()
        .map(|s| {
            let repo_or_plan = s.repo.clone().or_else(|| s.plan_name.clone()).unwrap_or_else(|| "-".to_string());
            Row::new(vec![
                Cell::from(s.id.clone()),
                Cell::from(status_label(s.status)),
                Cell::from(kind_label(s.kind)),
                Cell::from(repo_or_plan),
                Cell::from(format!("{}s", s.state_duration_seconds(now))),
            ])
        })
        .collect();

    let widths = [
        Constraint::Percentage(28),
        Constraint::Percentage(14),
        Constraint::Percentage(18),
        Constraint::Percentage(28),
        Constraint::Percentage(12),
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(" sessions "))
        .row_highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol("> ");

    let mut state = ratatui::widgets::TableState::default();
    if !app.visible_sessions().is_empty() {
        state.select(Some(app.selected));
    }
    frame.render_stateful_widget(table, area, &mut state);
}

fn draw_footer(frame: &mut Frame, area: Rect, app: &App) {
    let help = "q quit  j/k move  x kill  a archive  c hide-completed  f toggle-filter  1-4 set-status  r refresh";
    let line = match &app.status_message {
        Some(msg) => Line::from(vec![Span::raw(msg.clone()), Span::raw("  "), Span::raw(help)]),
        None => Line::from(help),
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn status_label(status: SessionStatus) -> &'static str {
    crate::app::status_key(status)
}

fn kind_label(kind: SessionKind) -> &'static str {
    crate::app::kind_key(kind)
}
