//! The single user-visible notice banner.
//!
//! At most one notice is shown at a time. A newer transient notice replaces
//! an older one, but once the device is blocked the persistent blocked
//! notice stays put until the widget is torn down.

use std::time::Duration;

use tokio::time::Instant;

/// What a notice is about. Drives colour and dismissability in the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// The device is blocked; persistent and non-dismissable.
    Blocked,
    /// The backend asked us to slow down.
    RateLimited,
    /// A request failed.
    Error,
    /// A degraded feature, e.g. sound was muted.
    Warning,
}

/// A banner message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Monotonic identifier, used to match expiry timers to notices.
    pub id: u64,
    /// Category.
    pub kind: NoticeKind,
    /// Human-readable text.
    pub text: String,
    /// Whether the user may close it.
    pub dismissable: bool,
    /// When it disappears on its own, if ever.
    pub expires_at: Option<Instant>,
}

/// Holder of the current notice.
#[derive(Debug, Default)]
pub struct NoticeBoard {
    current: Option<Notice>,
    next_id: u64,
}

impl NoticeBoard {
    /// Create an empty board.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The notice currently shown.
    #[must_use]
    pub const fn current(&self) -> Option<&Notice> {
        self.current.as_ref()
    }

    /// Show a dismissable notice that expires after `ttl`.
    ///
    /// Returns `None` if a blocked notice is showing; it is never replaced.
    pub fn show_transient(
        &mut self,
        kind: NoticeKind,
        text: impl Into<String>,
        ttl: Duration,
    ) -> Option<Notice> {
        if self.is_blocked() {
            return None;
        }
        let notice = Notice {
            id: self.bump(),
            kind,
            text: text.into(),
            dismissable: true,
            expires_at: Some(Instant::now() + ttl),
        };
        self.current = Some(notice.clone());
        Some(notice)
    }

    /// Show the persistent blocked notice, replacing anything else.
    pub fn show_blocked(&mut self, text: impl Into<String>) -> Notice {
        let notice = Notice {
            id: self.bump(),
            kind: NoticeKind::Blocked,
            text: text.into(),
            dismissable: false,
            expires_at: None,
        };
        self.current = Some(notice.clone());
        notice
    }

    /// Close the current notice if it is dismissable. Returns whether
    /// anything was closed.
    pub fn dismiss(&mut self) -> bool {
        if self.current.as_ref().is_some_and(|n| n.dismissable) {
            self.current = None;
            return true;
        }
        false
    }

    /// Remove notice `id` if it is still the current one.
    ///
    /// Expiry timers race with newer notices; a stale timer must not clear
    /// its successor.
    pub fn expire(&mut self, id: u64) -> bool {
        if self
            .current
            .as_ref()
            .is_some_and(|n| n.id == id && n.expires_at.is_some())
        {
            self.current = None;
            return true;
        }
        false
    }

    fn is_blocked(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|n| n.kind == NoticeKind::Blocked)
    }

    fn bump(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}
