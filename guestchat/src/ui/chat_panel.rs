//! Chat panel rendering (message list + input box).

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};

use super::theme;
use crate::app::{App, Mode};

/// Render the chat panel (messages + input box).
pub fn render(frame: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)])
        .split(area);

    render_messages(frame, chunks[0], app);
    render_input(frame, chunks[1], app);
}

/// Panel title with the loaded page window.
fn title(app: &App) -> String {
    let p = &app.pagination;
    if p.has_older() {
        format!(
            "Support chat | page {}/{} | PgUp: older messages",
            p.page, p.total_pages
        )
    } else {
        format!("Support chat | page {}/{}", p.page, p.total_pages)
    }
}

/// Render the message list, keeping the scroll target in view.
fn render_messages(frame: &mut Frame, area: Rect, app: &App) {
    let items: Vec<ListItem> = app
        .messages
        .iter()
        .map(|msg| {
            let content_style = if msg.pending {
                theme::pending()
            } else {
                theme::normal()
            };
            let mut spans = vec![
                Span::styled(&msg.timestamp, theme::timestamp()),
                Span::raw(" "),
                Span::styled(&msg.sender, theme::sender(msg.from_support)),
                Span::raw(": "),
                Span::styled(&msg.content, content_style),
            ];
            if msg.pending {
                spans.push(Span::styled(" \u{22ef}", theme::dimmed()));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let block = Block::default()
        .title(Span::styled(title(app), theme::panel_title(theme::CHAT_TITLE)))
        .borders(Borders::ALL)
        .border_style(theme::normal());

    let list = if items.is_empty() {
        List::new(vec![ListItem::new(Line::from(Span::styled(
            "No messages yet. Say hello!",
            theme::dimmed(),
        )))])
    } else {
        List::new(items)
    }
    .block(block);

    let mut state = ListState::default();
    if !app.messages.is_empty() {
        state.select(Some(app.message_scroll));
    }
    frame.render_stateful_widget(list, area, &mut state);
}

/// Render the input box.
fn render_input(frame: &mut Frame, area: Rect, app: &App) {
    let is_focused = app.mode == Mode::Chat;

    let line = if app.state.is_blocked() {
        Line::from(Span::styled("Sending is disabled for this device.", theme::dimmed()))
    } else if app.input.text.is_empty() && !is_focused {
        Line::from(Span::styled("Type a message...", theme::dimmed()))
    } else {
        let mut text = app.input.text.clone();
        if is_focused {
            text.insert(app.input.byte_index(), '█');
        }
        Line::from(Span::styled(text, theme::normal()))
    };

    let title = if app.state.is_sending() {
        "Message (sending...)"
    } else {
        "Message"
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(if is_focused {
            theme::highlighted()
        } else {
            theme::normal()
        });

    frame.render_widget(Paragraph::new(line).block(block), area);
}
