//! Terminal UI rendering.

pub mod chat_panel;
pub mod nickname;
pub mod status_bar;
pub mod theme;

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::Paragraph,
};

use crate::app::{App, Mode};

/// Main draw function for the entire UI.
pub fn draw(frame: &mut Frame, app: &App) {
    let banner_height = u16::from(app.notice.is_some());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(banner_height),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_notice(frame, chunks[0], app);
    chat_panel::render(frame, chunks[1], app);
    status_bar::render(frame, chunks[2], app);

    if app.mode == Mode::Nickname {
        nickname::render(frame, chunks[1], app);
    }
}

/// Render the notice banner, if any.
fn render_notice(frame: &mut Frame, area: Rect, app: &App) {
    let Some(notice) = &app.notice else {
        return;
    };
    let mut spans = vec![Span::raw(format!(" {} ", notice.text))];
    if notice.dismissable {
        spans.push(Span::raw("(^D to dismiss)"));
    }
    let banner = Paragraph::new(Line::from(spans)).style(theme::notice(notice.kind));
    frame.render_widget(banner, area);
}
