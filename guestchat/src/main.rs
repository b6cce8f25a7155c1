//! `GuestChat` -- guest support chat in the terminal.
//!
//! Talks to the support backend over HTTP. Configuration via CLI flags,
//! environment variables, or config file
//! (`~/.config/guestchat/config.toml`).
//!
//! ```bash
//! # Against a local guestchat-server
//! cargo run --bin guestchat
//!
//! # Against another backend
//! cargo run --bin guestchat -- --base-url https://support.example.com
//! GUESTCHAT_URL=https://support.example.com cargo run --bin guestchat
//! ```

use std::io;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::mpsc;
use tracing_appender::non_blocking::WorkerGuard;

use guestchat::api::http::HttpChatApi;
use guestchat::app::{Action, App};
use guestchat::chat::{ChatEvent, GuestChat};
use guestchat::config::{CliArgs, ClientConfig};
use guestchat::identity::DeviceIdentity;
use guestchat::notify::player::{CommandPlayer, CuePlayer, TerminalBell};
use guestchat::storage::{ClientStorage, FileStorage, MemoryStorage};
use guestchat::ui;

type Chat = GuestChat<HttpChatApi, dyn ClientStorage, CuePlayer>;

#[tokio::main]
async fn main() -> io::Result<()> {
    let cli = CliArgs::parse();

    // Load and resolve configuration (CLI args > env > config file > defaults).
    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config file: {e}");
            ClientConfig::default()
        }
    };

    // Initialize logging before terminal setup (logs go to file, not stdout).
    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    tracing::info!(base_url = %config.base_url, "guestchat starting");

    let api = HttpChatApi::new(&config.base_url, config.request_timeout, &config.user_agent)
        .map_err(io::Error::other)?;
    let storage = open_storage(&config);
    let identity = DeviceIdentity::load_or_create(&*storage);
    let player = build_player(&config);

    let (chat, events) = Chat::new(api, storage, player, identity, config.chat.clone());

    // Initial load runs in the background so the UI comes up immediately.
    let mounting = chat.clone();
    tokio::spawn(async move { mounting.mount().await });

    // Set up terminal.
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app.
    let result = run_app(&mut terminal, &chat, events, &config);

    // Restore terminal.
    chat.unmount();
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    tracing::info!("guestchat exiting");
    result
}

/// Initialize file-based logging.
///
/// Logs are written to a file (never stdout, since ratatui owns the terminal).
/// Returns a [`WorkerGuard`] that must be held until shutdown to ensure all
/// buffered log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("guestchat.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

/// Open the state file, falling back to memory so the chat still works
/// (with a fresh identity) when the file is unusable.
fn open_storage(config: &ClientConfig) -> Arc<dyn ClientStorage> {
    let path = match config.state_file.clone() {
        Some(path) => Ok(path),
        None => FileStorage::default_path(),
    };
    match path.and_then(FileStorage::open) {
        Ok(storage) => {
            tracing::info!(path = %storage.path().display(), "using state file");
            Arc::new(storage)
        }
        Err(e) => {
            tracing::warn!(error = %e, "state file unavailable, identity will not persist");
            Arc::new(MemoryStorage::new())
        }
    }
}

fn build_player(config: &ClientConfig) -> CuePlayer {
    match (&config.sound_command, &config.sound_file) {
        (Some(command), Some(file)) => CuePlayer::Command(CommandPlayer::new(command, file)),
        _ => CuePlayer::Bell(TerminalBell),
    }
}

/// Main application loop.
fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    chat: &Chat,
    mut events: mpsc::Receiver<ChatEvent>,
    config: &ClientConfig,
) -> io::Result<()> {
    let mut app = App::new(
        &chat.device_name(),
        &config.timestamp_format,
        config.chat.page_limit,
    );
    app.apply_snapshot(chat.snapshot());

    loop {
        // Step 1: Draw the UI frame.
        terminal.draw(|frame| ui::draw(frame, &app))?;

        // Step 2: Drain pending chat events; any event means re-read the widget.
        let mut changed = false;
        while events.try_recv().is_ok() {
            changed = true;
        }
        if changed {
            app.apply_snapshot(chat.snapshot());
        }

        // Step 3: Poll for terminal input events.
        if event::poll(config.poll_timeout)?
            && let Event::Key(key) = event::read()?
        {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if let Some(action) = app.handle_key_event(key) {
                dispatch(chat, action);
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

/// Run an [`Action`] against the widget without blocking the UI thread.
///
/// Failures are reported by the widget itself through its notice banner.
fn dispatch(chat: &Chat, action: Action) {
    match action {
        Action::Send(text) => {
            let chat = chat.clone();
            tokio::spawn(async move {
                if let Err(e) = chat.send(&text).await {
                    tracing::debug!(error = %e, "send did not complete");
                }
            });
        }
        Action::Rename(name) => {
            let chat = chat.clone();
            tokio::spawn(async move {
                if let Err(e) = chat.rename(&name).await {
                    tracing::debug!(error = %e, "rename did not complete");
                }
            });
        }
        Action::LoadOlder => {
            let chat = chat.clone();
            tokio::spawn(async move {
                if let Err(e) = chat.load_older_page().await {
                    tracing::debug!(error = %e, "loading older page failed");
                }
            });
        }
        Action::SetSound(enabled) => {
            chat.set_sound_enabled(enabled);
        }
        Action::DismissNotice => {
            chat.dismiss_notice();
        }
    }
}
