//! Application state and event handling for the terminal front end.
//!
//! [`App`] is a plain view model: it mirrors the latest [`ChatSnapshot`]
//! and turns key presses into [`Action`]s. Anything that needs the
//! network is returned to the caller instead of being done here.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use guestchat_proto::message::{Message, SenderType, validate_display_name};

use crate::chat::{ChatSnapshot, Notice, PaginationState, WidgetState};

/// Something the main loop should do on the widget's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Send this text.
    Send(String),
    /// Rename the device.
    Rename(String),
    /// Load the next older page.
    LoadOlder,
    /// Turn sound on or off.
    SetSound(bool),
    /// Close the notice banner.
    DismissNotice,
}

/// Which surface receives key presses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// The message input.
    Chat,
    /// The nickname modal.
    Nickname,
}

/// A message for display in the chat panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayMessage {
    /// Sender's display name.
    pub sender: String,
    /// Message content.
    pub content: String,
    /// Formatted local timestamp (e.g., "14:23").
    pub timestamp: String,
    /// Not yet confirmed by the server.
    pub pending: bool,
    /// Written by support staff.
    pub from_support: bool,
}

impl DisplayMessage {
    fn from_message(msg: &Message, timestamp_format: &str) -> Self {
        let local = msg.created_at.as_datetime().with_timezone(&chrono::Local);
        Self {
            sender: msg.sender_name.clone(),
            content: msg.content.clone(),
            timestamp: local.format(timestamp_format).to_string(),
            pending: msg.is_temp(),
            from_support: msg.sender_type == SenderType::Admin,
        }
    }
}

/// A single-line text field with a character cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextField {
    /// Current text.
    pub text: String,
    /// Cursor position in characters.
    pub cursor: usize,
}

impl TextField {
    /// A field pre-filled with `text`, cursor at the end.
    #[must_use]
    pub fn with_text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            cursor: text.chars().count(),
        }
    }

    /// Take the text, leaving the field empty.
    pub fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.text)
    }

    /// Apply an editing key. Returns whether the key was consumed.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char(c) => {
                let at = self.byte_index();
                self.text.insert(at, c);
                self.cursor += 1;
            }
            KeyCode::Backspace if self.cursor > 0 => {
                self.cursor -= 1;
                let at = self.byte_index();
                self.text.remove(at);
            }
            KeyCode::Left => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Right => self.cursor = (self.cursor + 1).min(self.text.chars().count()),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.text.chars().count(),
            _ => return false,
        }
        true
    }

    /// Byte offset of the cursor.
    #[must_use]
    pub fn byte_index(&self) -> usize {
        self.text
            .char_indices()
            .nth(self.cursor)
            .map_or(self.text.len(), |(i, _)| i)
    }
}

/// Main application state.
pub struct App {
    /// Message input.
    pub input: TextField,
    /// Nickname modal input.
    pub nickname: TextField,
    /// Validation error shown inside the nickname modal.
    pub nickname_error: Option<String>,
    /// Which surface has focus.
    pub mode: Mode,
    /// Messages, oldest first.
    pub messages: Vec<DisplayMessage>,
    /// Index of the last visible message.
    pub message_scroll: usize,
    /// Widget state.
    pub state: WidgetState,
    /// The visible notice, if any.
    pub notice: Option<Notice>,
    /// Loaded history window.
    pub pagination: PaginationState,
    /// Current display name.
    pub device_name: String,
    /// Whether sound is on.
    pub sound_enabled: bool,
    /// chrono format string for message timestamps.
    pub timestamp_format: String,
    /// Whether the app should quit.
    pub should_quit: bool,
}

impl App {
    /// Create an empty view.
    #[must_use]
    pub fn new(device_name: &str, timestamp_format: &str, page_limit: u32) -> Self {
        Self {
            input: TextField::default(),
            nickname: TextField::default(),
            nickname_error: None,
            mode: Mode::Chat,
            messages: Vec::new(),
            message_scroll: 0,
            state: WidgetState::default(),
            notice: None,
            pagination: PaginationState::new(page_limit),
            device_name: device_name.to_string(),
            sound_enabled: true,
            timestamp_format: timestamp_format.to_string(),
            should_quit: false,
        }
    }

    /// Mirror the widget. Scrolls to the newest message when the list
    /// grew at the tail.
    pub fn apply_snapshot(&mut self, snapshot: ChatSnapshot) {
        let messages: Vec<DisplayMessage> = snapshot
            .messages
            .iter()
            .map(|m| DisplayMessage::from_message(m, &self.timestamp_format))
            .collect();
        if messages.last() != self.messages.last() {
            self.message_scroll = messages.len().saturating_sub(1);
        }
        self.messages = messages;
        self.message_scroll = self
            .message_scroll
            .min(self.messages.len().saturating_sub(1));
        self.state = snapshot.state;
        self.notice = snapshot.notice;
        self.pagination = snapshot.pagination;
        self.device_name = snapshot.device_name;
        self.sound_enabled = snapshot.sound_enabled;
    }

    /// Whether the input can be submitted right now.
    #[must_use]
    pub const fn can_send(&self) -> bool {
        !self.state.is_blocked() && !self.state.is_sending()
    }

    /// Handle a key event. Returns an action when the widget must act.
    pub fn handle_key_event(&mut self, key: KeyEvent) -> Option<Action> {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return None;
        }
        match self.mode {
            Mode::Chat => self.handle_chat_key(key),
            Mode::Nickname => self.handle_nickname_key(key),
        }
    }

    fn handle_chat_key(&mut self, key: KeyEvent) -> Option<Action> {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return match key.code {
                KeyCode::Char('n') => {
                    self.open_nickname();
                    None
                }
                KeyCode::Char('o') => self.pagination.has_older().then_some(Action::LoadOlder),
                KeyCode::Char('s') => Some(Action::SetSound(!self.sound_enabled)),
                KeyCode::Char('d') => self.notice.is_some().then_some(Action::DismissNotice),
                _ => None,
            };
        }

        match key.code {
            KeyCode::Esc => {
                self.should_quit = true;
                None
            }
            KeyCode::Enter => self.submit_message(),
            KeyCode::PageUp => self.pagination.has_older().then_some(Action::LoadOlder),
            KeyCode::Up => {
                self.message_scroll = self.message_scroll.saturating_sub(1);
                None
            }
            KeyCode::Down => {
                if self.message_scroll + 1 < self.messages.len() {
                    self.message_scroll += 1;
                }
                None
            }
            _ => {
                self.input.handle_key(key);
                None
            }
        }
    }

    fn handle_nickname_key(&mut self, key: KeyEvent) -> Option<Action> {
        match key.code {
            KeyCode::Esc => {
                self.close_nickname();
                None
            }
            KeyCode::Enter => match validate_display_name(&self.nickname.text) {
                Ok(name) => {
                    let name = name.to_string();
                    self.close_nickname();
                    Some(Action::Rename(name))
                }
                Err(e) => {
                    self.nickname_error = Some(e.to_string());
                    None
                }
            },
            _ => {
                if self.nickname.handle_key(key) {
                    self.nickname_error = None;
                }
                None
            }
        }
    }

    fn open_nickname(&mut self) {
        self.nickname = TextField::with_text(&self.device_name);
        self.nickname_error = None;
        self.mode = Mode::Nickname;
    }

    fn close_nickname(&mut self) {
        self.nickname = TextField::default();
        self.nickname_error = None;
        self.mode = Mode::Chat;
    }

    /// Submit the current input as a message.
    fn submit_message(&mut self) -> Option<Action> {
        if self.input.text.trim().is_empty() || !self.can_send() {
            return None;
        }
        Some(Action::Send(self.input.take()))
    }
}
