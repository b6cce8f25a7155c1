//! Nickname modal.

use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};

use guestchat_proto::message::{MAX_NAME_LEN, MIN_NAME_LEN};

use super::theme;
use crate::app::App;

/// Render the modal centred over `area`.
pub fn render(frame: &mut Frame, area: Rect, app: &App) {
    let popup = centered(area, 50, 6);
    frame.render_widget(Clear, popup);

    let mut text = app.nickname.text.clone();
    text.insert(app.nickname.byte_index(), '█');

    let hint = app.nickname_error.as_ref().map_or_else(
        || {
            Line::from(Span::styled(
                format!("{MIN_NAME_LEN}-{MAX_NAME_LEN} characters"),
                theme::dimmed(),
            ))
        },
        |err| Line::from(Span::styled(err.as_str(), theme::normal().fg(theme::ERROR))),
    );

    let block = Block::default()
        .title(Span::styled("Change nickname", theme::highlighted()))
        .borders(Borders::ALL)
        .border_style(theme::highlighted());
    let body = Paragraph::new(vec![
        Line::from(Span::styled(text, theme::normal())),
        Line::raw(""),
        hint,
    ])
    .block(block);
    frame.render_widget(body, popup);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let [row] = Layout::vertical([Constraint::Length(height)])
        .flex(Flex::Center)
        .areas(area);
    let [cell] = Layout::horizontal([Constraint::Length(width)])
        .flex(Flex::Center)
        .areas(row);
    cell
}
