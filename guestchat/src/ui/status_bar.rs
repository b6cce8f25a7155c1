//! Status bar rendering.

use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
    widgets::Paragraph,
};

use super::theme;
use crate::app::{App, Mode};
use crate::chat::SyncState;

/// Render the status bar at the bottom of the screen.
pub fn render(frame: &mut Frame, area: Rect, app: &App) {
    let help_text = match app.mode {
        Mode::Chat => {
            "Enter: send | ^N: nickname | PgUp/^O: older | ^S: sound | ^D: dismiss | Esc: quit"
        }
        Mode::Nickname => "Enter: save name | Esc: cancel",
    };

    let (dot_color, status_text) = match app.state.sync() {
        None => (theme::ERROR, "Blocked".to_string()),
        Some(SyncState::Idle) => (theme::SUCCESS, "Connected".to_string()),
        Some(SyncState::Polling) => (theme::SUCCESS, "Refreshing...".to_string()),
        Some(SyncState::RateLimited) => (theme::WARNING, "Rate limited".to_string()),
        Some(SyncState::Error) => (theme::WARNING, "Connection problem".to_string()),
    };
    let sound = if app.sound_enabled { "sound on" } else { "sound off" };

    let status_line = Line::from(vec![
        Span::styled(concat!("GuestChat v", env!("CARGO_PKG_VERSION")), theme::bold()),
        Span::raw(" | "),
        Span::styled("●", theme::normal().fg(dot_color)),
        Span::raw(format!(" {status_text}")),
        Span::raw(" | "),
        Span::raw(app.device_name.as_str()),
        Span::raw(" | "),
        Span::raw(sound),
        Span::raw(" | "),
        Span::styled(help_text, theme::dimmed()),
    ]);

    let paragraph = Paragraph::new(status_line).style(theme::status_bar_bg());
    frame.render_widget(paragraph, area);
}
