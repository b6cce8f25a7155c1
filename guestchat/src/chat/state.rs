//! Explicit widget state machine.
//!
//! ```text
//!            403 (any flow)
//!   Active ────────────────► Blocked   (terminal)
//!     │
//!     ├─ sync:    Idle ⇄ Polling → Idle | RateLimited | Error
//!     └─ sending: false ⇄ true
//! ```
//!
//! `Blocked` carries no sub-state: a blocked widget can neither poll nor
//! send, and the type makes that unrepresentable.

/// Status of the background poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    /// No request in flight; last poll (if any) succeeded.
    #[default]
    Idle,
    /// A poll request is in flight.
    Polling,
    /// The last poll was rejected with 429.
    RateLimited,
    /// The last poll failed for another reason.
    Error,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Polling => write!(f, "polling"),
            Self::RateLimited => write!(f, "rate-limited"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Overall widget state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetState {
    /// Normal operation.
    Active {
        /// Poll loop status.
        sync: SyncState,
        /// Whether a send is in flight.
        sending: bool,
    },
    /// The backend blocked this device. Terminal for the session.
    Blocked,
}

impl Default for WidgetState {
    fn default() -> Self {
        Self::Active {
            sync: SyncState::Idle,
            sending: false,
        }
    }
}

impl WidgetState {
    /// Whether the device has been blocked.
    #[must_use]
    pub const fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked)
    }

    /// Whether a send is in flight.
    #[must_use]
    pub const fn is_sending(&self) -> bool {
        matches!(self, Self::Active { sending: true, .. })
    }

    /// Poll loop status, or `None` when blocked.
    #[must_use]
    pub const fn sync(&self) -> Option<SyncState> {
        match self {
            Self::Active { sync, .. } => Some(*sync),
            Self::Blocked => None,
        }
    }

    /// Update the poll status. No effect when blocked.
    pub const fn set_sync(&mut self, state: SyncState) {
        if let Self::Active { sync, .. } = self {
            *sync = state;
        }
    }

    /// Claim the single send slot.
    ///
    /// # Errors
    ///
    /// Returns [`SendRejection::Blocked`] or [`SendRejection::Busy`] when a
    /// send may not start.
    pub const fn begin_send(&mut self) -> Result<(), SendRejection> {
        match self {
            Self::Blocked => Err(SendRejection::Blocked),
            Self::Active { sending: true, .. } => Err(SendRejection::Busy),
            Self::Active { sending, .. } => {
                *sending = true;
                Ok(())
            }
        }
    }

    /// Release the send slot. No effect when blocked.
    pub const fn end_send(&mut self) {
        if let Self::Active { sending, .. } = self {
            *sending = false;
        }
    }

    /// Enter the terminal blocked state.
    pub const fn block(&mut self) {
        *self = Self::Blocked;
    }
}

impl std::fmt::Display for WidgetState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active { sync, sending: true } => write!(f, "{sync}, sending"),
            Self::Active { sync, .. } => write!(f, "{sync}"),
            Self::Blocked => write!(f, "blocked"),
        }
    }
}

/// Why a send could not start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendRejection {
    /// The device is blocked.
    Blocked,
    /// Another send is in flight.
    Busy,
}
