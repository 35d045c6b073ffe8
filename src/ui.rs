//! Terminal UI rendering.
//!
//! All drawing logic lives here, separated from application state ([`App`])
//! and input handling ([`crate::input`]).
//!
//! The layout is a scrollable timeline on top, an optional panel listing
//! accounts that failed, and a one-line status bar at the bottom.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame,
};

use crate::app::App;

/// Rows of the failure panel before it stops growing.
const MAX_FAILURE_ROWS: usize = 5;

/// Draw the complete UI for one frame.
pub fn draw(app: &mut App, frame: &mut Frame) {
    let problems = app.unresolved.len() + app.failures.len();
    let panel_height = if problems == 0 {
        0
    } else {
        problems.min(MAX_FAILURE_ROWS) as u16 + 2
    };

    let [main_area, failure_area, status_area] = Layout::vertical([
        Constraint::Min(1),
        Constraint::Length(panel_height),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    draw_timeline(app, frame, main_area);
    if panel_height > 0 {
        draw_failures(app, frame, failure_area);
    }
    draw_status_bar(app, frame, status_area);
}

/// Render the scrollable, merged timeline.
fn draw_timeline(app: &mut App, frame: &mut Frame, area: Rect) {
    let list_items: Vec<ListItem> = app
        .posts
        .iter()
        .map(|post| {
            let caption = post
                .caption
                .as_deref()
                .and_then(|c| c.lines().next())
                .filter(|c| !c.is_empty())
                .unwrap_or("(no caption)");

            let line = Line::from(vec![
                Span::styled(
                    format!("{:<17}", post.created.format("%Y-%m-%d %H:%M")),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::raw(" "),
                Span::styled(
                    format!("@{:<16}", app.owner_label(post)),
                    Style::default().fg(Color::Cyan),
                ),
                Span::raw(" "),
                Span::styled(caption.to_string(), Style::default().fg(Color::White)),
                Span::raw("  "),
                Span::styled(
                    post.display_url().unwrap_or("").to_string(),
                    Style::default().fg(Color::DarkGray),
                ),
            ]);

            ListItem::new(line)
        })
        .collect();

    let list = List::new(list_items)
        .block(Block::default().title(" Timeline ").borders(Borders::ALL))
        .highlight_style(
            Style::default()
                .add_modifier(Modifier::BOLD)
                .bg(Color::DarkGray),
        )
        .highlight_symbol("▸ ");

    frame.render_stateful_widget(list, area, &mut app.list_state);
}

/// Render the accounts that could not be resolved or fetched.
fn draw_failures(app: &App, frame: &mut Frame, area: Rect) {
    let lines: Vec<Line> = app
        .unresolved
        .iter()
        .chain(app.failures.iter())
        .take(MAX_FAILURE_ROWS)
        .map(|text| Line::from(Span::styled(text.as_str(), Style::default().fg(Color::Red))))
        .collect();

    let panel = Paragraph::new(lines).block(
        Block::default()
            .title(" Failed accounts ")
            .borders(Borders::ALL),
    );
    frame.render_widget(panel, area);
}

/// Render the bottom status bar.
fn draw_status_bar(app: &App, frame: &mut Frame, area: Rect) {
    let status = Paragraph::new(Line::from(vec![
        Span::styled(" ", Style::default()),
        Span::styled(&app.status, Style::default().fg(Color::Yellow)),
        Span::raw("  "),
        Span::styled(
            format!("{} posts", app.posts.len()),
            Style::default().fg(Color::Green),
        ),
        Span::raw("  q: quit  r: refresh  ↑/↓: scroll  Home/End: jump"),
    ]));
    frame.render_widget(status, area);
}
