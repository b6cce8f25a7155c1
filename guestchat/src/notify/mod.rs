//! Audio cue for inbound support messages.
//!
//! The cue is a capability, not a requirement: if the player turns out to
//! be unusable the notifier mutes itself, persists that choice so the probe
//! is not repeated on every start, and tells the caller once.

pub mod player;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::storage::{ClientStorage, SOUND_ENABLED_KEY};

/// Errors from a [`SoundPlayer`].
#[derive(Debug, thiserror::Error)]
pub enum PlayError {
    /// The environment refused autonomous playback.
    #[error("playback not allowed: {0}")]
    NotAllowed(String),

    /// The cue resource or player is missing.
    #[error("sound unavailable: {0}")]
    Unavailable(String),

    /// Any other I/O failure while playing.
    #[error("playback failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Something that can play the notification cue.
pub trait SoundPlayer: Send + Sync {
    /// Cheap check that the cue can be played at all.
    ///
    /// # Errors
    ///
    /// Returns [`PlayError`] if the cue resource is unusable.
    fn probe(&self) -> Result<(), PlayError>;

    /// Play the cue from the beginning.
    ///
    /// # Errors
    ///
    /// Returns [`PlayError`] if playback fails.
    fn play(&self) -> Result<(), PlayError>;
}

impl<T: SoundPlayer + ?Sized> SoundPlayer for Arc<T> {
    fn probe(&self) -> Result<(), PlayError> {
        (**self).probe()
    }

    fn play(&self) -> Result<(), PlayError> {
        (**self).play()
    }
}

/// Something the user should be told about the sound feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundWarning {
    /// The cue cannot be played; sound has been turned off.
    Unavailable,
    /// Playback was refused by the environment. Reported once.
    PlaybackBlocked,
}

impl SoundWarning {
    /// Banner text for this warning.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::Unavailable => "Notification sound unavailable; sound has been turned off.",
            Self::PlaybackBlocked => "Notification sound was blocked by the system.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Probe {
    Pending,
    Passed,
    Failed,
}

#[derive(Debug)]
struct NotifierState {
    enabled: bool,
    probe: Probe,
    warned_blocked: bool,
}

/// Plays the cue when enabled and keeps the `soundEnabled` preference.
pub struct Notifier<P, S: ?Sized> {
    player: P,
    storage: Arc<S>,
    state: Mutex<NotifierState>,
}

impl<P: SoundPlayer, S: ClientStorage + ?Sized> Notifier<P, S> {
    /// Create a notifier, restoring the persisted preference (default on).
    pub fn new(player: P, storage: Arc<S>) -> Self {
        let enabled = storage
            .get(SOUND_ENABLED_KEY)
            .is_none_or(|v| v != "false");
        Self {
            player,
            storage,
            state: Mutex::new(NotifierState {
                enabled,
                probe: Probe::Pending,
                warned_blocked: false,
            }),
        }
    }

    /// Whether sound is currently on.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    /// The underlying player.
    #[must_use]
    pub const fn player(&self) -> &P {
        &self.player
    }

    /// Play the cue if sound is enabled.
    ///
    /// The first call probes the player. Returns a warning the caller
    /// should surface, if any.
    pub fn play(&self) -> Option<SoundWarning> {
        let mut state = self.state.lock();
        if !state.enabled {
            return None;
        }
        if state.probe == Probe::Pending
            && let Some(warning) = self.run_probe(&mut state)
        {
            return Some(warning);
        }

        match self.player.play() {
            Ok(()) => None,
            Err(PlayError::NotAllowed(reason)) => {
                tracing::warn!(%reason, "notification sound blocked");
                if state.warned_blocked {
                    None
                } else {
                    state.warned_blocked = true;
                    Some(SoundWarning::PlaybackBlocked)
                }
            }
            Err(PlayError::Unavailable(reason)) => {
                tracing::warn!(%reason, "notification sound became unavailable");
                state.probe = Probe::Failed;
                self.disable(&mut state);
                Some(SoundWarning::Unavailable)
            }
            Err(PlayError::Io(e)) => {
                tracing::warn!(error = %e, "notification sound failed");
                None
            }
        }
    }

    /// Turn sound on or off and persist the choice.
    ///
    /// Turning sound on re-probes the player; if it is still unusable sound
    /// stays off and a warning is returned.
    pub fn set_enabled(&self, enabled: bool) -> Option<SoundWarning> {
        let mut state = self.state.lock();
        if enabled {
            state.probe = Probe::Pending;
            state.enabled = true;
            if let Some(warning) = self.run_probe(&mut state) {
                return Some(warning);
            }
        } else {
            state.enabled = false;
        }
        self.persist(state.enabled);
        None
    }

    fn run_probe(&self, state: &mut NotifierState) -> Option<SoundWarning> {
        match self.player.probe() {
            Ok(()) => {
                state.probe = Probe::Passed;
                None
            }
            Err(e) => {
                tracing::info!(error = %e, "sound probe failed, muting");
                state.probe = Probe::Failed;
                self.disable(state);
                Some(SoundWarning::Unavailable)
            }
        }
    }

    fn disable(&self, state: &mut NotifierState) {
        state.enabled = false;
        self.persist(false);
    }

    fn persist(&self, enabled: bool) {
        let value = if enabled { "true" } else { "false" };
        if let Err(e) = self.storage.set(SOUND_ENABLED_KEY, value) {
            tracing::warn!(error = %e, "failed to persist sound preference");
        }
    }
}

impl<P: std::fmt::Debug, S: ?Sized> std::fmt::Debug for Notifier<P, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("player", &self.player)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}
