//! Concrete [`SoundPlayer`] implementations.

use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::{PlayError, SoundPlayer};

/// Rings the terminal bell (`BEL`, `0x07`).
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalBell;

impl SoundPlayer for TerminalBell {
    fn probe(&self) -> Result<(), PlayError> {
        if std::io::stdout().is_terminal() {
            Ok(())
        } else {
            Err(PlayError::Unavailable("stdout is not a terminal".into()))
        }
    }

    fn play(&self) -> Result<(), PlayError> {
        let mut out = std::io::stdout().lock();
        out.write_all(b"\x07")?;
        out.flush()?;
        Ok(())
    }
}

/// Plays an audio file through an external command, e.g. `paplay`.
///
/// Starting a new cue kills the previous player so rapid notifications
/// restart from the beginning instead of queueing.
#[derive(Debug)]
pub struct CommandPlayer {
    program: String,
    file: PathBuf,
    child: Mutex<Option<Child>>,
}

impl CommandPlayer {
    /// Play `file` with `program`.
    #[must_use]
    pub fn new(program: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            file: file.into(),
            child: Mutex::new(None),
        }
    }
}

impl SoundPlayer for CommandPlayer {
    fn probe(&self) -> Result<(), PlayError> {
        if self.file.is_file() {
            Ok(())
        } else {
            Err(PlayError::Unavailable(format!(
                "sound file {} not found",
                self.file.display()
            )))
        }
    }

    fn play(&self) -> Result<(), PlayError> {
        let mut slot = self.child.lock();
        if let Some(mut previous) = slot.take() {
            // Already exited is fine.
            let _ = previous.kill();
            let _ = previous.wait();
        }

        let child = Command::new(&self.program)
            .arg(&self.file)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::PermissionDenied => PlayError::NotAllowed(e.to_string()),
                std::io::ErrorKind::NotFound => {
                    PlayError::Unavailable(format!("player {} not found", self.program))
                }
                _ => PlayError::Io(e),
            })?;
        *slot = Some(child);
        Ok(())
    }
}

impl Drop for CommandPlayer {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.get_mut().take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// The players the binary can be configured with.
#[derive(Debug)]
pub enum CuePlayer {
    /// Terminal bell.
    Bell(TerminalBell),
    /// External command.
    Command(CommandPlayer),
}

impl SoundPlayer for CuePlayer {
    fn probe(&self) -> Result<(), PlayError> {
        match self {
            Self::Bell(p) => p.probe(),
            Self::Command(p) => p.probe(),
        }
    }

    fn play(&self) -> Result<(), PlayError> {
        match self {
            Self::Bell(p) => p.play(),
            Self::Command(p) => p.play(),
        }
    }
}

/// Scripted outcome for [`StubPlayer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StubBehavior {
    /// Probe and play succeed.
    Works,
    /// Probe fails: the cue resource does not exist.
    Missing,
    /// Probe succeeds but playback is refused.
    Refused,
}

/// In-memory player for tests: counts plays and fails on demand.
#[derive(Debug)]
pub struct StubPlayer {
    behavior: Mutex<StubBehavior>,
    probes: AtomicUsize,
    plays: AtomicUsize,
}

impl StubPlayer {
    /// Create a player with the given behaviour.
    #[must_use]
    pub fn new(behavior: StubBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            probes: AtomicUsize::new(0),
            plays: AtomicUsize::new(0),
        }
    }

    /// Change behaviour for subsequent calls.
    pub fn set_behavior(&self, behavior: StubBehavior) {
        *self.behavior.lock() = behavior;
    }

    /// Number of probes so far.
    #[must_use]
    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    /// Number of successful plays so far.
    #[must_use]
    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }
}

impl Default for StubPlayer {
    fn default() -> Self {
        Self::new(StubBehavior::Works)
    }
}

impl SoundPlayer for StubPlayer {
    fn probe(&self) -> Result<(), PlayError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        match *self.behavior.lock() {
            StubBehavior::Missing => Err(PlayError::Unavailable("stub: missing".into())),
            StubBehavior::Works | StubBehavior::Refused => Ok(()),
        }
    }

    fn play(&self) -> Result<(), PlayError> {
        match *self.behavior.lock() {
            StubBehavior::Works => {
                self.plays.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            StubBehavior::Refused => Err(PlayError::NotAllowed("stub: refused".into())),
            StubBehavior::Missing => Err(PlayError::Unavailable("stub: missing".into())),
        }
    }
}
