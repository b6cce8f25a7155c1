//! Theme and styling constants for the TUI.

use ratatui::style::{Color, Modifier, Style};

use crate::chat::NoticeKind;

/// Primary foreground color.
pub const FG_PRIMARY: Color = Color::White;

/// Secondary foreground color (dimmed text).
pub const FG_SECONDARY: Color = Color::Gray;

/// Highlight color for focused elements.
pub const HIGHLIGHT: Color = Color::Cyan;

/// Success/idle indicator color.
pub const SUCCESS: Color = Color::Green;

/// Warning indicator color.
pub const WARNING: Color = Color::Yellow;

/// Error/blocked indicator color.
pub const ERROR: Color = Color::Red;

/// Sender name color for the guest.
pub const GUEST: Color = Color::LightBlue;

/// Sender name color for support staff.
pub const SUPPORT: Color = Color::LightMagenta;

/// Panel title color for the chat panel.
pub const CHAT_TITLE: Color = Color::Cyan;

/// Normal text style.
#[must_use]
pub fn normal() -> Style {
    Style::default().fg(FG_PRIMARY)
}

/// Dimmed text style (timestamps, metadata).
#[must_use]
pub fn dimmed() -> Style {
    Style::default().fg(FG_SECONDARY)
}

/// Bold text style.
#[must_use]
pub fn bold() -> Style {
    Style::default().fg(FG_PRIMARY).add_modifier(Modifier::BOLD)
}

/// Highlighted text style (focused borders).
#[must_use]
pub fn highlighted() -> Style {
    Style::default().fg(HIGHLIGHT).add_modifier(Modifier::BOLD)
}

/// Style for a sender name.
#[must_use]
pub fn sender(from_support: bool) -> Style {
    let color = if from_support { SUPPORT } else { GUEST };
    Style::default().fg(color).add_modifier(Modifier::BOLD)
}

/// Style for a message not yet confirmed by the server.
#[must_use]
pub fn pending() -> Style {
    Style::default()
        .fg(FG_SECONDARY)
        .add_modifier(Modifier::ITALIC)
}

/// Style for timestamps (dark gray).
#[must_use]
pub fn timestamp() -> Style {
    Style::default().fg(Color::Rgb(120, 120, 120))
}

/// Style for the status bar background (dark background with white foreground).
#[must_use]
pub fn status_bar_bg() -> Style {
    Style::default().fg(Color::White).bg(Color::Rgb(30, 30, 50))
}

/// Style for panel titles with a given color (bold).
#[must_use]
pub fn panel_title(color: Color) -> Style {
    Style::default().fg(color).add_modifier(Modifier::BOLD)
}

/// Banner style for a notice.
#[must_use]
pub fn notice(kind: NoticeKind) -> Style {
    let bg = match kind {
        NoticeKind::Blocked | NoticeKind::Error => ERROR,
        NoticeKind::RateLimited | NoticeKind::Warning => WARNING,
    };
    Style::default()
        .fg(Color::Black)
        .bg(bg)
        .add_modifier(Modifier::BOLD)
}
